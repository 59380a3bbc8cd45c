// Latency ping server.
//
// Listens on TCP, hands the client a fresh mailbox name, attaches a receiver
// once the client has created the mailbox, then measures one-way latency of
// the timestamped frames the client publishes.
//
// cargo run --example ping_server -- [port]
// cargo run --example ping_client -- [port]

mod frame;

use shm_mailbox::Receiver;
use std::io::Write;
use std::net::TcpListener;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const SAMPLES: usize = 500;

fn attach_with_retry(name: &str) -> shm_mailbox::Result<Receiver> {
    let mut attempt = 1;
    loop {
        match Receiver::attach(name) {
            Ok(receiver) => {
                info!(attempt, "attached receiver");
                return Ok(receiver);
            }
            Err(e) if attempt < 5_000 => {
                if attempt == 1 {
                    info!(error = %e, "waiting for client to create {name}");
                }
                attempt += 1;
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(e) => return Err(e),
        }
    }
}

fn report(latencies: &mut [u64], corrupt: usize) {
    latencies.sort_unstable();
    let samples = latencies.len();
    let total: u64 = latencies.iter().sum();
    let avg = total as f64 / samples as f64 / 1_000.0;
    let median = if samples % 2 == 0 {
        (latencies[samples / 2 - 1] + latencies[samples / 2]) as f64 / 2_000.0
    } else {
        latencies[samples / 2] as f64 / 1_000.0
    };
    let min = latencies[0] as f64 / 1_000.0;
    let max = latencies[samples - 1] as f64 / 1_000.0;

    info!(
        samples,
        corrupt,
        "latency avg: {avg:.2} µs, median: {median:.2} µs, min: {min:.2} µs, max: {max:.2} µs"
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    frame::setup_logging();

    let port = frame::port_from_args();
    let listener = TcpListener::bind(("127.0.0.1", port))?;
    info!("listening on 127.0.0.1:{port}");

    let (mut stream, peer) = listener.accept()?;
    let suffix: String = std::iter::repeat_with(fastrand::alphanumeric)
        .take(8)
        .collect();
    let name = format!("ping.{suffix}");
    writeln!(stream, "{name}")?;
    info!(%peer, %name, "client connected, mailbox name sent");

    let mut receiver = match attach_with_retry(&name) {
        Ok(receiver) => receiver,
        Err(e) => {
            error!(error = %e, "failed to attach receiver");
            return Err(e.into());
        }
    };

    let mut latencies = Vec::with_capacity(SAMPLES);
    let mut corrupt = 0;
    let mut expected_seq = 0;
    let mut last_message = Instant::now();

    while latencies.len() < SAMPLES {
        let got = receiver.poll_with(|payload| {
            let received = frame::monotonic_nanos();
            match frame::decode(payload) {
                Some((seq, sent)) => {
                    if seq != expected_seq {
                        warn!(seq, expected_seq, "out of order frame");
                    }
                    expected_seq = seq + 1;
                    latencies.push(received.saturating_sub(sent));
                }
                None => corrupt += 1,
            }
        });

        if got {
            last_message = Instant::now();
        } else if last_message.elapsed() > Duration::from_secs(5) {
            warn!(received = latencies.len(), "client went quiet, stopping early");
            break;
        } else {
            std::thread::yield_now();
        }
    }

    if latencies.is_empty() {
        error!("no frames received");
        return Ok(());
    }
    report(&mut latencies, corrupt);
    Ok(())
}
