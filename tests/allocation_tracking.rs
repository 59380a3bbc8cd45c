// Allocation tracking tests for the publish/poll hot path
//
// Note: Tests using dhat are marked with #[serial_test::serial] because
// dhat only allows one profiler to run at a time. They will run sequentially.
//
// cargo test --test allocation_tracking -- --nocapture

use shm_mailbox::{Publisher, Receiver};

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

fn unique_name() -> String {
    let suffix: String = std::iter::repeat_with(fastrand::alphanumeric)
        .take(10)
        .collect();
    format!("alloc.{suffix}")
}

#[test]
#[serial_test::serial]
fn test_steady_state_is_allocation_free() {
    let name = unique_name();
    let mut publisher = Publisher::create(&name, 64, 128).unwrap();
    let mut receiver = Receiver::attach(&name).unwrap();
    let mut buffer = Vec::with_capacity(128);

    let _profiler = dhat::Profiler::builder().testing().build();
    let before = dhat::HeapStats::get();

    for i in 0..10_000u32 {
        let bytes = i.to_le_bytes();
        publisher.try_publish(bytes).unwrap();
        publisher
            .publish_with(false, |slot| {
                slot[..4].copy_from_slice(&bytes);
                slot[4..8].copy_from_slice(&bytes);
                8
            })
            .unwrap();

        assert!(receiver.poll_into(&mut buffer));
        assert_eq!(buffer, bytes);
        assert!(receiver.poll_with(|payload| assert_eq!(payload.len(), 8)));
    }

    let after = dhat::HeapStats::get();
    println!("allocations during 20000 round trips: {}", after.total_blocks - before.total_blocks);
    dhat::assert_eq!(after.total_blocks, before.total_blocks);
}

#[test]
#[serial_test::serial]
fn test_poll_allocates_one_buffer_per_message() {
    let name = unique_name();
    let mut publisher = Publisher::create(&name, 64, 128).unwrap();
    let mut receiver = Receiver::attach(&name).unwrap();

    let _profiler = dhat::Profiler::builder().testing().build();
    let before = dhat::HeapStats::get();

    for i in 0..100u8 {
        publisher.try_publish([i; 16]).unwrap();
        let message = receiver.poll().unwrap();
        assert_eq!(message, [i; 16]);
    }

    let after = dhat::HeapStats::get();
    dhat::assert_eq!(after.total_blocks - before.total_blocks, 100);
}
