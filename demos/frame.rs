#![allow(dead_code)]

// Frame format shared by the ping demos:
// [seq u64 LE][sent CLOCK_MONOTONIC ns u64 LE][sha256(seq LE) 32 bytes]

use sha2::{Digest, Sha256};

pub const FRAME_LEN: usize = 48;

pub const DEFAULT_PORT: u16 = 9090;

/// System-wide monotonic clock, comparable across processes on one host.
pub fn monotonic_nanos() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}

/// Write a frame into `slot`, returning its length.
pub fn encode(seq: u64, sent_nanos: u64, slot: &mut [u8]) -> usize {
    let digest = Sha256::digest(seq.to_le_bytes());
    slot[..8].copy_from_slice(&seq.to_le_bytes());
    slot[8..16].copy_from_slice(&sent_nanos.to_le_bytes());
    slot[16..FRAME_LEN].copy_from_slice(&digest);
    FRAME_LEN
}

/// Parse a frame, returning `(seq, sent_nanos)` if its digest checks out.
pub fn decode(frame: &[u8]) -> Option<(u64, u64)> {
    if frame.len() != FRAME_LEN {
        return None;
    }
    let seq = u64::from_le_bytes(frame[..8].try_into().ok()?);
    let sent_nanos = u64::from_le_bytes(frame[8..16].try_into().ok()?);
    let digest = Sha256::digest(seq.to_le_bytes());
    (frame[16..] == digest[..]).then_some((seq, sent_nanos))
}

pub fn setup_logging() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

pub fn port_from_args() -> u16 {
    std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}
