pub mod SharedMemory;

pub use SharedMemory::{RawHandle, SharedRegion};
