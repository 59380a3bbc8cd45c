use crate::error::Result;
use crate::SPSC::Buffer::{MailboxMapping, MailboxRole};
use std::fmt;
use tracing::warn;

/// The single reader of a mailbox.
///
/// A receiver attaches to a mailbox some publisher already created. It never
/// creates one and never unlinks the name; closing it only drops the local
/// mapping.
///
/// Polling never blocks. Pacing repeated empty polls (sleeping, yielding,
/// spinning) is left to the caller.
pub struct Receiver {
    mapping: MailboxMapping,
}

impl Receiver {
    /// Attach to the existing mailbox `name`.
    ///
    /// Fails with `OpenFailed` if no such mailbox exists, or with
    /// `CorruptLayout` if its header was never initialized.
    pub fn attach(name: &str) -> Result<Self> {
        let mapping = MailboxMapping::open(name, MailboxRole::Receiver)?;
        Ok(Self { mapping })
    }

    /// Hand the next message to `reader` without copying it, then free the slot.
    ///
    /// # Returns
    /// * `Ok(true)` if a message was read
    /// * `Ok(false)` if the mailbox is empty, or the next slot's length is
    ///   impossible (larger than the slot). In the latter case `tail` is not
    ///   advanced, so the same slot is reported again on every poll.
    /// * `Err(Closed)` after `close()`
    pub fn try_poll_with<F>(&mut self, reader: F) -> Result<bool>
    where
        F: FnOnce(&[u8]),
    {
        let (head, tail) = self.mapping.consumer_head_tail()?;
        if head == tail {
            return Ok(false);
        }

        let offset = self.mapping.slot_offset(tail);
        let length = self.mapping.read_length(offset)? as usize;

        if length > self.mapping.slot_size() {
            warn!(
                name = %self.mapping.name(),
                tail,
                length,
                slot_size = self.mapping.slot_size(),
                "ignoring slot with corrupted length"
            );
            return Ok(false);
        }

        self.mapping.with_payload(offset, length, reader)?;

        self.mapping.release_tail(tail.wrapping_add(1))?;
        Ok(true)
    }

    /// Zero-copy poll. Returns `true` if `reader` was handed a message.
    ///
    /// A closed receiver reports no message.
    pub fn poll_with<F>(&mut self, reader: F) -> bool
    where
        F: FnOnce(&[u8]),
    {
        self.try_poll_with(reader).unwrap_or(false)
    }

    /// Returns the next message, or `None` if there is none.
    pub fn poll(&mut self) -> Option<Vec<u8>> {
        let mut message = Vec::new();
        self.poll_into(&mut message).then_some(message)
    }

    /// Poll into a reusable buffer to avoid an allocation per message.
    ///
    /// On success `buffer` holds exactly the message; otherwise it is untouched.
    pub fn poll_into(&mut self, buffer: &mut Vec<u8>) -> bool {
        self.poll_with(|payload| {
            buffer.clear();
            buffer.extend_from_slice(payload);
        })
    }

    /// Receives a message from the mailbox if one is available.
    ///
    /// # Returns
    /// * `Ok(Some(data))` if a message was received
    /// * `Ok(None)` if no message is available
    /// * `Err(Closed)` if this receiver was closed
    pub fn receive(&mut self) -> Result<Option<Vec<u8>>> {
        let mut message = None;
        self.try_poll_with(|payload| message = Some(payload.to_vec()))?;
        Ok(message)
    }

    /// Maximum payload size of a single message
    pub fn capacity(&self) -> usize {
        self.mapping.slot_size()
    }

    pub fn slot_count(&self) -> usize {
        self.mapping.slot_count()
    }

    pub fn name(&self) -> &str {
        self.mapping.name()
    }

    /// Messages published but not yet consumed
    pub fn pending(&self) -> Result<usize> {
        self.mapping.pending()
    }

    /// Drop the local mapping. The mailbox itself stays. Idempotent.
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

impl fmt::Debug for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_receiver(self, f)
    }
}
