//! Error types for the assistant widget.

use waybill_core::error::WaybillError;
use waybill_core::Role;

/// Errors from the assistant widget.
///
/// None of these reach the end user: the host swallows rejected submissions
/// and a catalog that fails to load is a setup problem.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("catalog has no entries for role '{0}'")]
    MissingRole(Role),
    #[error("role '{0}' has no default context")]
    MissingDefaultContext(Role),
    #[error("role '{0}' lists the default context twice")]
    DuplicateDefaultContext(Role),
    #[error("entry '{context}' for role '{role}' has an empty message")]
    BlankEntryMessage { role: Role, context: String },
    #[error("knowledge load error: {0}")]
    KnowledgeLoad(String),
    #[error("invalid reply transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("no async runtime available: {0}")]
    NoRuntime(String),
}

impl From<WaybillError> for AssistantError {
    fn from(err: WaybillError) -> Self {
        AssistantError::KnowledgeLoad(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_error_display() {
        let err = AssistantError::EmptyMessage;
        assert_eq!(err.to_string(), "message cannot be empty");

        let err = AssistantError::MessageTooLong(500);
        assert_eq!(
            err.to_string(),
            "message exceeds maximum length of 500 characters"
        );

        let err = AssistantError::MissingDefaultContext(Role::Employee);
        assert_eq!(err.to_string(), "role 'employee' has no default context");

        let err = AssistantError::MissingRole(Role::Admin);
        assert_eq!(err.to_string(), "catalog has no entries for role 'admin'");

        let err = AssistantError::DuplicateDefaultContext(Role::Visitor);
        assert_eq!(
            err.to_string(),
            "role 'visitor' lists the default context twice"
        );

        let err = AssistantError::BlankEntryMessage {
            role: Role::Client,
            context: "box-view".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "entry 'box-view' for role 'client' has an empty message"
        );

        let err = AssistantError::KnowledgeLoad("bad file".to_string());
        assert_eq!(err.to_string(), "knowledge load error: bad file");

        let err = AssistantError::InvalidTransition {
            from: "Idle".to_string(),
            to: "Revealed".to_string(),
        };
        assert_eq!(err.to_string(), "invalid reply transition: Idle -> Revealed");
    }

    #[test]
    fn test_assistant_error_from_waybill_error() {
        let io_err = WaybillError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "catalog.toml",
        ));
        let err: AssistantError = io_err.into();
        assert!(matches!(err, AssistantError::KnowledgeLoad(_)));
        assert!(err.to_string().contains("catalog.toml"));
    }

    #[test]
    fn test_errors_implement_debug() {
        let dbg = format!("{:?}", AssistantError::EmptyMessage);
        assert!(dbg.contains("EmptyMessage"));

        let dbg = format!("{:?}", AssistantError::MissingDefaultContext(Role::Admin));
        assert!(dbg.contains("MissingDefaultContext"));
    }
}
