use crate::error::{MailboxError, Result};
use crate::SPSC::Buffer::{MailboxMapping, MailboxRole};
use std::fmt;
use tracing::trace;

/// The single writer of a mailbox.
///
/// Creating a publisher creates the named shared memory object; dropping or
/// closing it unlinks the name again. Messages are copied (or produced in
/// place) into the next free slot and published by advancing `head`.
///
/// Only one publisher may exist per mailbox name, across all processes.
pub struct Publisher {
    mapping: MailboxMapping,
}

impl Publisher {
    /// Create the mailbox `name` with `slot_count` slots of `slot_size` bytes.
    ///
    /// Fails with `OpenFailed` if a mailbox of that name already exists.
    pub fn create(name: &str, slot_count: usize, slot_size: usize) -> Result<Self> {
        let mapping = MailboxMapping::open(
            name,
            MailboxRole::Publisher {
                slot_count,
                slot_size,
            },
        )?;
        Ok(Self { mapping })
    }

    /// Reserve the next slot, returning the `head` value it belongs to.
    ///
    /// When the ring is full, returns `Ok(None)` without blocking, or with
    /// `blocking` yields the thread and retries until the receiver frees a
    /// slot. There is no timeout.
    pub fn reserve_slot(&self, blocking: bool) -> Result<Option<u64>> {
        loop {
            let (head, tail) = self.mapping.producer_head_tail()?;
            let used = head.wrapping_sub(tail);

            if used < self.mapping.slot_count as u64 {
                return Ok(Some(head));
            }

            if !blocking {
                return Ok(None);
            }

            std::thread::yield_now();
        }
    }

    /// Write a message directly into the next slot.
    ///
    /// `writer` receives exactly `capacity()` bytes of slot payload and returns
    /// how many of them make up the message. Nothing becomes visible to the
    /// receiver until `writer` has returned and the count has been checked.
    ///
    /// # Returns
    /// * `Err(QueueFull)` if non-blocking and no slot is free
    /// * `Err(MessageTooLarge)` if `writer` reports more than `capacity()` bytes
    /// * `Err(Closed)` after `close()`
    pub fn publish_with<F>(&mut self, blocking: bool, writer: F) -> Result<()>
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        let Some(head) = self.reserve_slot(blocking)? else {
            trace!(name = %self.mapping.name(), "mailbox full");
            return Err(MailboxError::QueueFull);
        };

        let slot_size = self.mapping.slot_size();
        let offset = self.mapping.slot_offset(head);

        let written = self.mapping.with_payload_mut(offset, slot_size, writer)?;
        if written > slot_size {
            return Err(MailboxError::MessageTooLarge {
                capacity: slot_size,
                length: written,
            });
        }

        // Plain store: ordered by the release of `head` below.
        self.mapping.write_length(offset, written as u32)?;
        self.mapping.publish_head(head.wrapping_add(1))
    }

    /// Copy `message` into the next slot and publish it.
    ///
    /// Messages longer than `capacity()` are rejected before a slot is reserved.
    pub fn publish<T: AsRef<[u8]>>(&mut self, message: T, blocking: bool) -> Result<()> {
        let message = message.as_ref();

        if message.len() > self.mapping.slot_size() {
            return Err(MailboxError::MessageTooLarge {
                capacity: self.mapping.slot_size(),
                length: message.len(),
            });
        }

        self.publish_with(blocking, |slot| {
            slot[..message.len()].copy_from_slice(message);
            message.len()
        })
    }

    /// Non-blocking [`Publisher::publish`].
    pub fn try_publish<T: AsRef<[u8]>>(&mut self, message: T) -> Result<()> {
        self.publish(message, false)
    }

    /// Maximum payload size of a single message
    pub fn capacity(&self) -> usize {
        self.mapping.slot_size()
    }

    pub fn slot_count(&self) -> usize {
        self.mapping.slot_count()
    }

    /// Canonical name the receiver attaches with
    pub fn name(&self) -> &str {
        self.mapping.name()
    }

    /// Messages the receiver has not consumed yet
    pub fn pending(&self) -> Result<usize> {
        self.mapping.pending()
    }

    /// Unmap the mailbox and unlink its name. Idempotent.
    ///
    /// A receiver that is still attached keeps its mapping but will see no
    /// further messages.
    pub fn close(&mut self) {
        self.mapping.close();
    }

    pub fn is_closed(&self) -> bool {
        self.mapping.is_closed()
    }

    pub(crate) fn mapping(&self) -> &MailboxMapping {
        &self.mapping
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_publisher(self, f)
    }
}
