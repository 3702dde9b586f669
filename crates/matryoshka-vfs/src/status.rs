use std::fmt;

use serde::Serialize;

use crate::error::{ErrorKind, VfsError, VfsResult};

/// Transient success/failure report with a human-readable message.
///
/// A successful status carries no kind and an empty message. Built from a
/// [`VfsResult`] at an API boundary that reports outcomes rather than
/// propagating errors, such as the command-line front end.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Status {
    kind: Option<ErrorKind>,
    message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn from_error(err: &VfsError) -> Self {
        Self {
            kind: Some(err.kind()),
            message: err.to_string(),
        }
    }

    pub fn from_result<T>(result: &VfsResult<T>) -> Self {
        match result {
            Ok(_) => Self::ok(),
            Err(err) => Self::from_error(err),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.kind.is_none()
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.kind
    }

    /// Failure description; empty on success.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            None => f.write_str("ok"),
            Some(kind) => write!(f, "{kind}: {}", self.message),
        }
    }
}

impl<T> From<&VfsResult<T>> for Status {
    fn from(result: &VfsResult<T>) -> Self {
        Self::from_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_status_has_empty_message() {
        let status = Status::from_result(&Ok::<_, VfsError>(5));
        assert!(status.is_ok());
        assert_eq!(status.kind(), None);
        assert_eq!(status.message(), "");
        assert_eq!(status.to_string(), "ok");
    }

    #[test]
    fn failed_status_carries_kind_and_message() {
        let result: VfsResult<()> = Err(VfsError::EntryNotFound("docs/a".into()));
        let status = Status::from(&result);
        assert!(!status.is_ok());
        assert_eq!(status.kind(), Some(ErrorKind::NotFound));
        assert_eq!(status.message(), "no entry at 'docs/a'");
        assert_eq!(status.to_string(), "not found: no entry at 'docs/a'");
    }

    #[test]
    fn serializes_for_reports() {
        let status = Status::from_error(&VfsError::Closed);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["kind"], "invalid_handle");
        assert_eq!(json["message"], "container is closed");
    }
}
