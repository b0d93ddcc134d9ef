use uuid::Uuid;

/// Redis channel name for a task's topic (§4.8: "topic-per-task").
pub fn topic_for_task(task_id: Uuid) -> String {
    format!("relay:progress:{task_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_is_namespaced_and_stable() {
        let id = Uuid::nil();
        assert_eq!(topic_for_task(id), format!("relay:progress:{id}"));
    }
}
