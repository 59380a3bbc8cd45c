use std::fmt;
use std::sync::atomic::Ordering;
use crate::Core::SharedRegion;
use crate::SPSC::Buffer::MailboxMapping;
use crate::SPSC::{Publisher, Receiver};

/// Debug function for SharedRegion
///
/// Shows the name, size, ownership and whether it is still mapped.
/// The mapped bytes are never dereferenced.
pub fn debug_shared_region(region: &SharedRegion, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SharedRegion")
        .field("name", &region.name())
        .field("size", &region.size())
        .field("handle", &region.raw_handle())
        .field("owner", &region.is_owner())
        .field("closed", &region.is_closed())
        .finish()
}

/// Debug function for MailboxMapping
///
/// Shows:
/// - Slot geometry
/// - A relaxed snapshot of head/tail (absent once closed)
pub fn debug_mailbox_mapping(mapping: &MailboxMapping, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let counters = mapping
        .with_header(|header| {
            (
                header.head.load(Ordering::Relaxed),
                header.tail.load(Ordering::Relaxed),
            )
        })
        .ok();

    f.debug_struct("MailboxMapping")
        .field("name", &mapping.name())
        .field("slot_count", &mapping.slot_count())
        .field("slot_size", &mapping.slot_size())
        .field("slot_stride", &mapping.slot_stride())
        .field("total_size", &mapping.total_size())
        .field("head_tail", &counters)
        .field("region", mapping.region())
        .finish()
}

pub fn debug_publisher(publisher: &Publisher, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Publisher").field(publisher.mapping()).finish()
}

pub fn debug_receiver(receiver: &Receiver, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Receiver").field(receiver.mapping()).finish()
}
