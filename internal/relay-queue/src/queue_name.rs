use std::fmt;

use relay_types::UserKind;

/// `<prefix>_<name>` with `prefix ∈ {"", "admin"}`; the empty prefix
/// serializes as just `<name>` (§6's wire shape, §4.1's queue selection).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueName {
    prefix: &'static str,
    name: String,
}

impl QueueName {
    pub fn new(kind: UserKind, name: impl Into<String>) -> Self {
        Self {
            prefix: kind.prefix(),
            name: name.into(),
        }
    }

    pub fn default_for(kind: UserKind) -> Self {
        Self::new(kind, "default")
    }

    pub fn as_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}_{}", self.prefix, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_queue_has_no_prefix() {
        assert_eq!(QueueName::default_for(UserKind::Web).as_wire(), "default");
    }

    #[test]
    fn admin_queue_is_prefixed() {
        assert_eq!(
            QueueName::default_for(UserKind::Admin).as_wire(),
            "admin_default"
        );
    }

    #[test]
    fn custom_queue_name_is_allowed_without_code_change() {
        assert_eq!(
            QueueName::new(UserKind::Web, "3d_tripo").as_wire(),
            "3d_tripo"
        );
    }
}
