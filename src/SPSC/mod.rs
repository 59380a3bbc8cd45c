mod builder;
mod publisher;
mod receiver;

pub use builder::MailboxBuilder;
pub use publisher::Publisher;
pub use receiver::Receiver;

pub mod Buffer {
    pub mod Buffer;
    pub mod Buffer_impl;
    pub mod layout;
    pub use Buffer::{MailboxMapping, MailboxRole}; // re-export for stable path
    pub use layout::MailboxHeader;
}
