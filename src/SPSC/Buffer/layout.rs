use crate::error::{MailboxError, Result};
use std::mem::{align_of, size_of};
use std::sync::atomic::AtomicU64;

/// POSIX shared memory names are limited to 30 bytes (excluding the leading
/// slash and the NUL terminator) on the platforms we target.
pub const MAX_NAME_LEN: usize = 30;

/// Prefix required by `shm_open` for portable names.
pub const NAME_PREFIX: char = '/';

/// Every slot starts with the payload length as a `u32`.
pub const LENGTH_PREFIX: usize = size_of::<u32>();

/// Slots are laid out on the natural word boundary.
pub const SLOT_ALIGN: usize = align_of::<u64>();

/// The mailbox header located at offset 0 of the shared memory region.
///
/// Only the two counters ever change after creation. `head` is written by the
/// publisher alone, `tail` by the receiver alone; each is read by the other
/// side with acquire ordering (see `MailboxMapping`).
#[repr(C, align(8))]
pub struct MailboxHeader {
    /// Next slot index to be written. Monotonic, never reduced modulo the ring.
    pub head: AtomicU64,

    /// Next slot index to be read and freed. Monotonic.
    pub tail: AtomicU64,

    /// Number of slots in the ring, fixed at creation.
    pub slot_count: u32,

    /// Maximum payload bytes per slot, fixed at creation.
    pub slot_size: u32,
}

impl MailboxHeader {
    pub fn new(slot_count: u32, slot_size: u32) -> Self {
        Self {
            head: AtomicU64::new(0),
            tail: AtomicU64::new(0),
            slot_count,
            slot_size,
        }
    }
}

/// Size of the header, padded to its 8-byte alignment.
pub const HEADER_SIZE: usize = size_of::<MailboxHeader>();

/// Byte offset of slot 0.
pub const SLOTS_OFFSET: usize = HEADER_SIZE;

/// Apply the shared memory naming convention: exactly one leading `/`.
///
/// The limit is measured on the name without its prefix.
pub fn canonical_name(name: &str) -> Result<String> {
    let stem = name.strip_prefix(NAME_PREFIX).unwrap_or(name);

    if stem.len() > MAX_NAME_LEN {
        return Err(MailboxError::NameTooLong {
            max: MAX_NAME_LEN,
            len: stem.len(),
        });
    }

    let reason = if stem.is_empty() {
        Some("name is empty")
    } else if stem.contains(NAME_PREFIX) {
        Some("name contains '/' after the prefix")
    } else if stem.contains('\0') {
        Some("name contains a NUL byte")
    } else {
        None
    };
    if let Some(reason) = reason {
        return Err(MailboxError::InvalidName {
            name: name.to_string(),
            reason,
        });
    }

    let mut canonical = String::with_capacity(stem.len() + 1);
    canonical.push(NAME_PREFIX);
    canonical.push_str(stem);
    Ok(canonical)
}

/// Aligned distance between consecutive slots: length prefix plus payload,
/// rounded up to `SLOT_ALIGN`.
#[inline]
pub fn slot_stride(slot_size: usize) -> usize {
    (LENGTH_PREFIX + slot_size + (SLOT_ALIGN - 1)) & !(SLOT_ALIGN - 1)
}

/// Total region size for `slot_count` slots of `slot_size` payload bytes.
#[inline]
pub fn total_size(slot_count: usize, slot_size: usize) -> usize {
    HEADER_SIZE + slot_count * slot_stride(slot_size)
}

/// Same as [`total_size`], but `None` on arithmetic overflow.
pub fn checked_total_size(slot_count: usize, slot_size: usize) -> Option<usize> {
    let raw = LENGTH_PREFIX.checked_add(slot_size)?.checked_add(SLOT_ALIGN - 1)?;
    let stride = raw & !(SLOT_ALIGN - 1);
    stride.checked_mul(slot_count)?.checked_add(HEADER_SIZE)
}

/// Validate a requested geometry and return its total size.
pub fn validate_capacity(slot_count: usize, slot_size: usize) -> Result<usize> {
    let invalid = MailboxError::InvalidCapacity {
        slot_count,
        slot_size,
    };

    if slot_count == 0 || slot_size == 0 {
        return Err(invalid);
    }
    if u32::try_from(slot_count).is_err() || u32::try_from(slot_size).is_err() {
        return Err(invalid);
    }
    checked_total_size(slot_count, slot_size)
        .filter(|&size| i64::try_from(size).is_ok())
        .ok_or(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_stride_rounds_to_word() {
        assert_eq!(slot_stride(0), 8);
        assert_eq!(slot_stride(4), 8);
        assert_eq!(slot_stride(5), 16);
        assert_eq!(slot_stride(8), 16);
        assert_eq!(slot_stride(12), 16);
        assert_eq!(slot_stride(64), 72);
        for size in 0..256 {
            assert_eq!(slot_stride(size) % SLOT_ALIGN, 0);
            assert!(slot_stride(size) >= LENGTH_PREFIX + size);
        }
    }

    #[test]
    fn test_total_size() {
        assert_eq!(HEADER_SIZE, 24);
        assert_eq!(total_size(4, 8), 24 + 4 * 16);
        assert_eq!(total_size(1024, 256), 24 + 1024 * 264);
        assert_eq!(checked_total_size(4, 8), Some(total_size(4, 8)));
        assert_eq!(checked_total_size(usize::MAX, 8), None);
        assert_eq!(checked_total_size(1, usize::MAX), None);
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("mbx").unwrap(), "/mbx");
        assert_eq!(canonical_name("/mbx").unwrap(), "/mbx");

        let thirty = "a".repeat(30);
        assert_eq!(canonical_name(&thirty).unwrap(), format!("/{thirty}"));
        assert_eq!(canonical_name(&format!("/{thirty}")).unwrap(), format!("/{thirty}"));

        match canonical_name(&"a".repeat(31)) {
            Err(MailboxError::NameTooLong { max, len }) => {
                assert_eq!(max, 30);
                assert_eq!(len, 31);
            }
            other => panic!("Expected NameTooLong, got {other:?}"),
        }

        // Limit is in UTF-8 bytes, not characters.
        assert!(matches!(
            canonical_name(&"é".repeat(16)),
            Err(MailboxError::NameTooLong { len: 32, .. })
        ));
    }

    #[test]
    fn test_canonical_name_rejects_malformed() {
        for bad in ["", "/", "a/b", "//a", "a\0b"] {
            assert!(
                matches!(canonical_name(bad), Err(MailboxError::InvalidName { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_capacity() {
        assert_eq!(validate_capacity(4, 8).unwrap(), total_size(4, 8));
        assert!(matches!(
            validate_capacity(0, 8),
            Err(MailboxError::InvalidCapacity { .. })
        ));
        assert!(matches!(
            validate_capacity(4, 0),
            Err(MailboxError::InvalidCapacity { .. })
        ));
        assert!(matches!(
            validate_capacity(u32::MAX as usize + 1, 8),
            Err(MailboxError::InvalidCapacity { .. })
        ));
    }
}
