use std::io;
use thiserror::Error;

/// Convenience result alias for mailbox operations.
pub type Result<T, E = MailboxError> = std::result::Result<T, E>;

/// Errors that can be raised while working with a shared mailbox.
#[derive(Error, Debug)]
pub enum MailboxError {
    #[error("Invalid capacity: {slot_count} slots of {slot_size} bytes")]
    InvalidCapacity { slot_count: usize, slot_size: usize },

    #[error("Mailbox name is {len} bytes, exceeds maximum of {max} bytes")]
    NameTooLong { max: usize, len: usize },

    #[error("Invalid mailbox name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("shm_open({name}) failed: {source}")]
    OpenFailed {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("ftruncate({name}, {size}) failed: {source}")]
    TruncateFailed {
        name: String,
        size: usize,
        #[source]
        source: io::Error,
    },

    #[error("fstat({name}) failed: {source}")]
    StatFailed {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("mmap({name}, {size}) failed: {source}")]
    MapFailed {
        name: String,
        size: usize,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt layout: header declares {slot_count} slots of {slot_size} bytes in a {region_size} byte region")]
    CorruptLayout {
        slot_count: u32,
        slot_size: u32,
        region_size: usize,
    },

    #[error("Mailbox queue is full")]
    QueueFull,

    #[error("Payload of {length} bytes exceeds mailbox capacity of {capacity} bytes")]
    MessageTooLarge { capacity: usize, length: usize },

    #[error("Access of {count} bytes at offset {offset} is outside the {len} byte region")]
    OutOfBounds {
        offset: usize,
        count: usize,
        len: usize,
    },

    #[error("Mailbox was closed")]
    Closed,
}

impl MailboxError {
    /// The OS error code behind a resource-acquisition failure, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            MailboxError::OpenFailed { source, .. }
            | MailboxError::TruncateFailed { source, .. }
            | MailboxError::StatFailed { source, .. }
            | MailboxError::MapFailed { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    /// Only a full queue is expected to clear up on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MailboxError::QueueFull)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_formatting() {
        let err = MailboxError::NameTooLong { max: 30, len: 31 };
        assert_eq!(
            err.to_string(),
            "Mailbox name is 31 bytes, exceeds maximum of 30 bytes"
        );

        let err = MailboxError::MessageTooLarge {
            capacity: 8,
            length: 9,
        };
        assert_eq!(
            err.to_string(),
            "Payload of 9 bytes exceeds mailbox capacity of 8 bytes"
        );

        assert_eq!(MailboxError::QueueFull.to_string(), "Mailbox queue is full");
        assert_eq!(MailboxError::Closed.to_string(), "Mailbox was closed");
    }

    #[test]
    fn test_os_errors_keep_errno() {
        let err = MailboxError::OpenFailed {
            name: "/mbx".to_string(),
            source: io::Error::from_raw_os_error(libc::ENOENT),
        };
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_retryable());

        assert_eq!(MailboxError::QueueFull.raw_os_error(), None);
        assert!(MailboxError::QueueFull.is_retryable());
    }
}
