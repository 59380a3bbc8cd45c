use super::{Publisher, Receiver};
use crate::error::{MailboxError, Result};

pub struct MailboxBuilder {
    name: Option<String>,
    slot_count: usize,
    slot_size: usize,
}

impl Default for MailboxBuilder {
    fn default() -> Self {
        Self {
            name: None,
            slot_count: 1024, // 1024 slots
            slot_size: 256,   // 256 payload bytes per slot
        }
    }
}

impl MailboxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_slot_count(mut self, slot_count: usize) -> Self {
        self.slot_count = slot_count;
        self
    }

    pub fn with_slot_size(mut self, slot_size: usize) -> Self {
        self.slot_size = slot_size;
        self
    }

    /// Create the mailbox. Only the publisher's geometry matters; receivers
    /// read it from the header.
    pub fn build_publisher(self) -> Result<Publisher> {
        let name = Self::require_name(self.name)?;
        Publisher::create(&name, self.slot_count, self.slot_size)
    }

    pub fn build_receiver(self) -> Result<Receiver> {
        let name = Self::require_name(self.name)?;
        Receiver::attach(&name)
    }

    fn require_name(name: Option<String>) -> Result<String> {
        name.ok_or(MailboxError::InvalidName {
            name: String::new(),
            reason: "no mailbox name configured",
        })
    }
}
