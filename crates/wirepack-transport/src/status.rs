//! Portable socket status codes

use crate::error::Result;

/// Outcome of a socket operation
///
/// Every fallible call returns a [`Result`]; [`status_of`] reduces it to one of
/// these five codes for callers that prefer to branch on a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The operation fully succeeded
    Done,
    /// A non-blocking call would have blocked. Not an error; retry later
    NotReady,
    /// A stream send wrote fewer bytes than requested; resume with the rest
    Partial,
    /// The stream peer closed the connection
    Disconnected,
    /// Unrecoverable failure for this operation
    Error,
}

impl Status {
    pub fn is_done(self) -> bool {
        self == Status::Done
    }

    /// Whether calling again later can make progress
    pub fn is_retryable(self) -> bool {
        matches!(self, Status::NotReady | Status::Partial)
    }
}

pub fn status_of<T>(result: &Result<T>) -> Status {
    match result {
        Ok(_) => Status::Done,
        Err(e) => e.status(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_status_of() {
        assert_eq!(status_of(&Ok::<_, Error>(3)), Status::Done);
        assert_eq!(status_of::<()>(&Err(Error::NotReady)), Status::NotReady);
        assert_eq!(
            status_of::<()>(&Err(Error::Partial { sent: 1 })),
            Status::Partial
        );
        assert_eq!(status_of::<()>(&Err(Error::Disconnected)), Status::Disconnected);
        assert_eq!(status_of::<()>(&Err(Error::Timeout)), Status::Error);
    }

    #[test]
    fn test_retryable() {
        assert!(Status::NotReady.is_retryable());
        assert!(Status::Partial.is_retryable());
        assert!(!Status::Disconnected.is_retryable());
        assert!(!Status::Error.is_retryable());
        assert!(Status::Done.is_done());
    }
}
