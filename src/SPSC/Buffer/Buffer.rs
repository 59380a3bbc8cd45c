// The shared mailbox ring - one header followed by `slot_count` fixed-stride slots

use crate::Core::SharedRegion;

/// Which half of the mailbox a mapping is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxRole {
    /// Creates the region and writes the header. Unlinks the name on close.
    Publisher { slot_count: usize, slot_size: usize },
    /// Attaches to an existing region and validates its header.
    Receiver,
}

/// A [`SharedRegion`] bound to the mailbox layout.
///
/// This struct is NOT stored in shared memory. It is a process-local view that
/// holds the mapped region plus the geometry read from (or written to) the
/// header at construction time.
///
/// ### Memory layout:
/// ```text
/// offset 0             head: u64 (atomic)
/// offset 8             tail: u64 (atomic)
/// offset 16            slot_count: u32
/// offset 20            slot_size: u32
/// offset HEADER_SIZE   slot[0]: length u32 | payload [slot_size] | pad
/// ...                  slot[i] at HEADER_SIZE + i * slot_stride
/// ```
///
/// ### Concurrency Design:
/// - **Publisher**: reads `head` relaxed and `tail` acquire, writes the slot,
///   then publishes with a release store of `head`.
/// - **Receiver**: reads `head` acquire and `tail` relaxed, reads the slot,
///   then frees it with a release store of `tail`.
///
/// Exactly one publisher and one receiver may use a mailbox. A second
/// process on either side corrupts the counters; this is not checked.
pub struct MailboxMapping {
    /// Canonical shared memory name (with the leading `/`).
    pub(crate) name: String,

    /// The mapped region backing the mailbox.
    pub(crate) shm: SharedRegion,

    /// Number of slots in the ring.
    pub(crate) slot_count: usize,

    /// Maximum payload size per slot.
    pub(crate) slot_size: usize,

    /// Byte distance between consecutive slots.
    pub(crate) slot_stride: usize,

    /// Bytes covered by header and slots; never larger than the mapping.
    pub(crate) total_size: usize,
}
