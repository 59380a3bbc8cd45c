use std::fmt;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use tracing::debug;

use super::layout::{self, MailboxHeader, HEADER_SIZE, LENGTH_PREFIX, SLOTS_OFFSET};
use super::Buffer::{MailboxMapping, MailboxRole};
use crate::error::{MailboxError, Result};
use crate::Core::SharedRegion;

impl MailboxMapping {
    /// Open the mailbox `name` for the given role.
    ///
    /// The name is canonicalized first, so configuration errors surface before
    /// any OS resource is touched.
    pub fn open(name: &str, role: MailboxRole) -> Result<Self> {
        let canonical = layout::canonical_name(name)?;

        match role {
            MailboxRole::Publisher {
                slot_count,
                slot_size,
            } => Self::create(canonical, slot_count, slot_size),
            MailboxRole::Receiver => Self::attach(canonical),
        }
    }

    fn create(name: String, slot_count: usize, slot_size: usize) -> Result<Self> {
        let total_size = layout::validate_capacity(slot_count, slot_size)?;
        let mut shm = SharedRegion::create(&name, total_size)?;

        // Written exactly once; afterwards only the counters change.
        // SAFETY: the header is repr(C) atomics and integers.
        unsafe {
            shm.with_value_mut(0, |header: &mut MailboxHeader| {
                *header = MailboxHeader::new(slot_count as u32, slot_size as u32);
            })?;
        }

        debug!(name = %name, slot_count, slot_size, total_size, "mailbox created");

        Ok(Self {
            name,
            shm,
            slot_count,
            slot_size,
            slot_stride: layout::slot_stride(slot_size),
            total_size,
        })
    }

    fn attach(name: String) -> Result<Self> {
        let shm = SharedRegion::open(&name)?;
        let region_size = shm.size();
        let corrupt = |slot_count, slot_size| MailboxError::CorruptLayout {
            slot_count,
            slot_size,
            region_size,
        };

        if region_size < HEADER_SIZE {
            return Err(corrupt(0, 0));
        }

        // SAFETY: the header is repr(C) atomics and integers.
        let (slot_count, slot_size) = unsafe {
            shm.with_value(0, |header: &MailboxHeader| {
                (header.slot_count, header.slot_size)
            })?
        };

        if slot_count == 0 || slot_size == 0 {
            return Err(corrupt(slot_count, slot_size));
        }

        let total_size = layout::checked_total_size(slot_count as usize, slot_size as usize)
            .filter(|&total| total <= region_size)
            .ok_or_else(|| corrupt(slot_count, slot_size))?;

        debug!(name = %name, slot_count, slot_size, region_size, "mailbox attached");

        Ok(Self {
            name,
            shm,
            slot_count: slot_count as usize,
            slot_size: slot_size as usize,
            slot_stride: layout::slot_stride(slot_size as usize),
            total_size,
        })
    }

    /// Scoped access to the header for loads and stores of the counters.
    pub fn with_header<R>(&self, f: impl FnOnce(&MailboxHeader) -> R) -> Result<R> {
        // SAFETY: the header is repr(C) atomics and integers.
        unsafe { self.shm.with_value(0, f) }
    }

    /// `(head, tail)` for the publisher.
    ///
    /// `head` is relaxed: the publisher is its only writer. `tail` is acquire,
    /// pairing with the receiver's release store so a freed slot is really done
    /// being read before it is reused.
    pub fn producer_head_tail(&self) -> Result<(u64, u64)> {
        self.with_header(|header| (header.head.load(Relaxed), header.tail.load(Acquire)))
    }

    /// `(head, tail)` for the receiver.
    ///
    /// `head` is acquire, pairing with the publisher's release store so the
    /// slot's length and payload are visible. `tail` is relaxed: the receiver
    /// is its only writer.
    pub fn consumer_head_tail(&self) -> Result<(u64, u64)> {
        self.with_header(|header| (header.head.load(Acquire), header.tail.load(Relaxed)))
    }

    /// Publish every slot below `head`. Release: orders the slot writes before it.
    pub(crate) fn publish_head(&self, head: u64) -> Result<()> {
        self.with_header(|header| header.head.store(head, Release))
    }

    /// Free every slot below `tail`. Release: orders the slot reads before it.
    pub(crate) fn release_tail(&self, tail: u64) -> Result<()> {
        self.with_header(|header| header.tail.store(tail, Release))
    }

    /// Messages published but not yet freed, as seen right now.
    pub fn pending(&self) -> Result<usize> {
        self.with_header(|header| {
            let head = header.head.load(Acquire);
            let tail = header.tail.load(Acquire);
            head.wrapping_sub(tail) as usize
        })
    }

    /// Byte offset of the slot that serves counter value `index`.
    #[inline]
    pub fn slot_offset(&self, index: u64) -> usize {
        let slot = (index % self.slot_count as u64) as usize;
        let offset = SLOTS_OFFSET + slot * self.slot_stride;
        debug_assert!(offset + self.slot_stride <= self.total_size);
        offset
    }

    pub(crate) fn read_length(&self, slot_offset: usize) -> Result<u32> {
        // SAFETY: any bit pattern is a valid u32.
        unsafe { self.shm.with_value(slot_offset, |length: &u32| *length) }
    }

    pub(crate) fn write_length(&mut self, slot_offset: usize, length: u32) -> Result<()> {
        // SAFETY: any bit pattern is a valid u32.
        unsafe {
            self.shm
                .with_value_mut(slot_offset, |slot: &mut u32| *slot = length)
        }
    }

    pub(crate) fn with_payload<R>(
        &self,
        slot_offset: usize,
        count: usize,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R> {
        self.shm.with_bytes(slot_offset + LENGTH_PREFIX, count, f)
    }

    pub(crate) fn with_payload_mut<R>(
        &mut self,
        slot_offset: usize,
        count: usize,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R> {
        self.shm.with_bytes_mut(slot_offset + LENGTH_PREFIX, count, f)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    pub fn slot_stride(&self) -> usize {
        self.slot_stride
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn region(&self) -> &SharedRegion {
        &self.shm
    }

    /// Release the mapping (and the name, on the publisher side). Idempotent.
    pub fn close(&mut self) {
        self.shm.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shm.is_closed()
    }
}

impl fmt::Debug for MailboxMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_mailbox_mapping(self, f)
    }
}
