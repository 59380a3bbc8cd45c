// Shared memory backend tests
// Run with: cargo test --test shared_memory -- --nocapture

#[cfg(unix)]
mod unix_tests {
    use shm_mailbox::Core::{RawHandle, SharedRegion};
    use shm_mailbox::MailboxError;

    fn unique_name() -> String {
        let suffix: String = std::iter::repeat_with(fastrand::alphanumeric)
            .take(12)
            .collect();
        format!("/shmtest.{suffix}")
    }

    #[test]
    fn test_create_shared_memory() {
        let name = unique_name();
        let shm = SharedRegion::create(&name, 4096).unwrap();

        assert_eq!(shm.size(), 4096);
        assert_eq!(shm.name(), name);
        assert!(shm.is_owner());
        assert!(!shm.is_closed());

        match shm.raw_handle() {
            RawHandle::Fd(fd) => assert!(fd >= 0, "File descriptor should be valid"),
        }
    }

    #[test]
    fn test_created_region_is_zeroed() {
        let name = unique_name();
        let shm = SharedRegion::create(&name, 1024).unwrap();

        shm.with_bytes(0, 1024, |bytes| {
            assert!(bytes.iter().all(|&b| b == 0), "New region should be zero-filled");
        })
        .unwrap();
    }

    #[test]
    fn test_writes_visible_to_second_mapping() {
        let name = unique_name();
        let mut owner = SharedRegion::create(&name, 8192).unwrap();
        let attached = SharedRegion::open(&name).unwrap();

        assert_eq!(attached.size(), 8192);
        assert!(!attached.is_owner());

        owner
            .with_bytes_mut(100, 100, |bytes| {
                for (i, b) in bytes.iter_mut().enumerate() {
                    *b = (i % 256) as u8;
                }
            })
            .unwrap();

        attached
            .with_bytes(100, 100, |bytes| {
                for (i, &b) in bytes.iter().enumerate() {
                    assert_eq!(b, (i % 256) as u8);
                }
            })
            .unwrap();
    }

    #[test]
    fn test_create_is_exclusive() {
        let name = unique_name();
        let _first = SharedRegion::create(&name, 4096).unwrap();

        let err = SharedRegion::create(&name, 4096).unwrap_err();
        assert!(matches!(err, MailboxError::OpenFailed { .. }), "got {err:?}");
        assert_eq!(err.raw_os_error(), Some(libc::EEXIST));
    }

    #[test]
    fn test_open_missing_region_fails() {
        let err = SharedRegion::open(&unique_name()).unwrap_err();
        assert!(matches!(err, MailboxError::OpenFailed { .. }), "got {err:?}");
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }

    #[test]
    fn test_owner_close_unlinks_name() {
        let name = unique_name();
        let mut owner = SharedRegion::create(&name, 4096).unwrap();
        let attached = SharedRegion::open(&name).unwrap();

        owner.with_bytes_mut(0, 4, |b| b.copy_from_slice(b"live")).unwrap();
        owner.close();

        // The name is gone...
        let err = SharedRegion::open(&name).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));

        // ...but mappings obtained earlier stay valid.
        attached.with_bytes(0, 4, |b| assert_eq!(b, b"live")).unwrap();

        // And the name is reusable.
        let _again = SharedRegion::create(&name, 4096).unwrap();
    }

    #[test]
    fn test_owner_drop_unlinks_name() {
        let name = unique_name();
        {
            let _owner = SharedRegion::create(&name, 4096).unwrap();
        }
        assert!(SharedRegion::open(&name).is_err());
    }

    #[test]
    fn test_attached_close_keeps_name() {
        let name = unique_name();
        let _owner = SharedRegion::create(&name, 4096).unwrap();

        let mut attached = SharedRegion::open(&name).unwrap();
        attached.close();
        assert!(attached.is_closed());

        let reopened = SharedRegion::open(&name).unwrap();
        assert_eq!(reopened.size(), 4096);
    }

    #[test]
    fn test_close_is_idempotent() {
        let name = unique_name();
        let mut shm = SharedRegion::create(&name, 4096).unwrap();

        shm.close();
        shm.close();
        assert!(shm.is_closed());

        assert!(matches!(
            shm.with_bytes(0, 1, |_| ()),
            Err(MailboxError::Closed)
        ));
        assert!(matches!(
            shm.with_bytes_mut(0, 1, |_| ()),
            Err(MailboxError::Closed)
        ));
    }

    #[test]
    fn test_views_are_bounds_checked() {
        let name = unique_name();
        let mut shm = SharedRegion::create(&name, 4096).unwrap();

        assert!(shm.with_bytes(0, 4096, |b| b.len()).is_ok());
        assert_eq!(shm.with_bytes(4096, 0, |b| b.len()).unwrap(), 0);

        match shm.with_bytes(4000, 97, |_| ()) {
            Err(MailboxError::OutOfBounds { offset, count, len }) => {
                assert_eq!((offset, count, len), (4000, 97, 4096));
            }
            other => panic!("Expected OutOfBounds, got {other:?}"),
        }

        assert!(matches!(
            shm.with_bytes_mut(usize::MAX, 2, |_| ()),
            Err(MailboxError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_rejects_nul_in_name() {
        assert!(matches!(
            SharedRegion::create("/bad\0name", 4096),
            Err(MailboxError::InvalidName { .. })
        ));
    }
}

#[cfg(not(unix))]
mod non_unix_tests {
    use shm_mailbox::Core::SharedRegion;

    #[test]
    fn test_unsupported_platform() {
        let err = SharedRegion::create("/test", 4096).unwrap_err();
        assert!(err.to_string().contains("only supported on Unix"));
    }
}
