//! Tests for the dedup logger.

#[cfg(test)]
mod tests {
    use crate::dedlog::log_entry::{bucket_key, entry_for_test};
    use crate::dedlog::sanitizer::{Sanitizer, WithCollapseSpaces};

    #[test]
    fn test_sanitizer_masks_addresses() {
        let s = Sanitizer::new(WithCollapseSpaces(true));
        assert_eq!(
            s.sanitize("dial 127.0.0.1:9103 failed:  Connection refused (os error 111)"),
            "dial <addr> failed: Connection refused (os error)"
        );
        assert_eq!(s.sanitize("host 10.0.0.1 unreachable"), "host <ip4> unreachable");
        assert_eq!(s.sanitize(""), "");
    }

    #[test]
    fn test_repeats_on_one_worker_share_bucket() {
        let s = Sanitizer::new(WithCollapseSpaces(true));
        let a = entry_for_test(
            Some("connect to 127.0.0.1:9101 refused (os error 111)"),
            Some("worker=1"),
            "worker dial failed",
        );
        let b = entry_for_test(
            Some("connect to 127.0.0.1:9101 refused (os error 104)"),
            Some("worker=1"),
            "worker dial failed",
        );
        let c = entry_for_test(
            Some("connect to 127.0.0.1:9101 refused"),
            Some("worker=1"),
            "control dial failed",
        );

        assert_eq!(bucket_key(&s, &a), bucket_key(&s, &b));
        assert_ne!(bucket_key(&s, &b), bucket_key(&s, &c));
    }

    #[test]
    fn test_same_failure_on_different_workers_is_counted_apart() {
        let s = Sanitizer::new(WithCollapseSpaces(true));
        let one = entry_for_test(
            Some("connect to 127.0.0.1:9101 refused"),
            Some("worker=1"),
            "worker dial failed",
        );
        let seven = entry_for_test(
            Some("connect to 127.0.0.1:9107 refused"),
            Some("worker=7"),
            "worker dial failed",
        );
        let bare = entry_for_test(None, None, "worker dial failed");

        assert_ne!(bucket_key(&s, &one), bucket_key(&s, &seven));
        assert_ne!(bucket_key(&s, &one), bucket_key(&s, &bare));
    }

    #[test]
    fn test_err_without_running_logger_is_noop() {
        crate::dedlog::err(None, Some("worker=1"), "dropped");
    }
}
