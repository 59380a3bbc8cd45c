// Latency ping client.
//
// Connects to the ping server, reads the mailbox name it hands out, creates
// the publisher under that name and sends timestamped frames. The mailbox is
// unlinked when the client exits, including on Ctrl-C.

mod frame;

use shm_mailbox::{MailboxBuilder, MailboxError};
use std::io::{BufRead, BufReader};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const FRAMES: u64 = 500;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    frame::setup_logging();

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.store(true, Ordering::Release))?;

    let port = frame::port_from_args();
    let stream = TcpStream::connect(("127.0.0.1", port))?;
    info!("connected to server");

    let mut name = String::new();
    BufReader::new(&stream).read_line(&mut name)?;
    let name = name.trim();
    if name.is_empty() {
        return Err("empty handshake".into());
    }
    info!(%name, "received mailbox name");

    let mut publisher = MailboxBuilder::new()
        .with_name(name)
        .with_slot_count(4096)
        .with_slot_size(64)
        .build_publisher()?;
    info!("publisher created; sending timestamped frames for latency sampling");

    let mut seq = 0;
    while seq < FRAMES && !stop.load(Ordering::Acquire) {
        let result = publisher.publish_with(false, |slot| {
            frame::encode(seq, frame::monotonic_nanos(), slot)
        });
        match result {
            Ok(()) => {
                seq += 1;
                std::thread::sleep(Duration::from_micros(100));
            }
            Err(MailboxError::QueueFull) => std::thread::yield_now(),
            Err(e) => return Err(e.into()),
        }
    }

    // Keep the name alive until the server has attached and drained.
    while publisher.pending()? > 0 && !stop.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(1));
    }

    info!(sent = seq, "done");
    publisher.close();
    Ok(())
}
