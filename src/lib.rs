//! A single-producer/single-consumer message mailbox over POSIX shared memory.
//!
//! One process creates a [`Publisher`] under a short name, another attaches a
//! [`Receiver`] to the same name. Messages travel through a fixed ring of
//! fixed-size slots in the shared region, synchronized only by an atomic
//! `head`/`tail` pair: no locks and no syscalls on the steady-state path.
//!
//! How the two processes agree on the name is up to the caller.
//!
//! ```no_run
//! use shm_mailbox::{Publisher, Receiver};
//!
//! let mut publisher = Publisher::create("mbx.demo", 1024, 256)?;
//! let mut receiver = Receiver::attach("mbx.demo")?;
//!
//! publisher.publish(b"hello", false)?;
//! assert_eq!(receiver.poll().as_deref(), Some(&b"hello"[..]));
//! # Ok::<(), shm_mailbox::MailboxError>(())
//! ```

// Module naming follows project convention (SPSC = Single-Producer Single-Consumer)
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod SPSC;
#[allow(non_snake_case)]
mod Debug {
    pub mod StructDebug;
}
pub mod error;

pub use error::{MailboxError, Result};
pub use SPSC::{MailboxBuilder, Publisher, Receiver};
