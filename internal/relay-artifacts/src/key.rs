use relay_types::Owner;
use uuid::Uuid;

/// Derives the fixed object key shape from §3:
/// `{env}/{web|admin}/{ownerId}/results/{toolSlug}/{taskId}[-{stepSuffix}].{ext}`.
/// Invariant: the key is a pure function of its inputs and is never rewritten
/// once computed, so a handler can recompute it to check for an existing
/// artifact without a round trip to the store.
pub fn artifact_key(
    env: &str,
    owner: &Owner,
    task_id: Uuid,
    tool_slug: &str,
    step_suffix: Option<&str>,
    ext: &str,
) -> String {
    match step_suffix {
        Some(suffix) => format!(
            "{env}/{}/{}/results/{tool_slug}/{task_id}-{suffix}.{ext}",
            owner.kind.bucket_partition(),
            owner.id,
        ),
        None => format!(
            "{env}/{}/{}/results/{tool_slug}/{task_id}.{ext}",
            owner.kind.bucket_partition(),
            owner.id,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_types::UserKind;

    #[test]
    fn key_has_no_step_suffix_for_single_step_tools() {
        let owner = Owner::new(UserKind::Web, "user-1");
        let task_id = Uuid::nil();
        let key = artifact_key("prod", &owner, task_id, "background-remove", None, "png");
        assert_eq!(
            key,
            format!("prod/users/user-1/results/background-remove/{task_id}.png")
        );
    }

    #[test]
    fn key_carries_step_suffix_for_multi_step_tools() {
        let owner = Owner::new(UserKind::Admin, "admin-1");
        let task_id = Uuid::nil();
        let key = artifact_key("prod", &owner, task_id, "photo-to-3d", Some("stylize"), "jpg");
        assert_eq!(
            key,
            format!("prod/admins/admin-1/results/photo-to-3d/{task_id}-stylize.jpg")
        );
    }
}
