// tests/property/worker_id_test.rs

//! Property-based tests for worker login parsing and extranonce assignment.

use proptest::prelude::*;
use stratumd::connection::{DEFAULT_WORKER_NAME, extranonce1_for, parse_worker_id};

proptest! {
    #[test]
    fn test_address_dot_worker_splits_at_first_dot(
        address in "[a-zA-Z0-9]{1,48}",
        worker in "[a-zA-Z0-9_.-]{1,24}",
    ) {
        let (a, w) = parse_worker_id(&format!("{address}.{worker}"));
        prop_assert_eq!(a, address);
        prop_assert_eq!(w, worker);
    }

    #[test]
    fn test_login_without_dot_uses_default_worker(address in "[a-zA-Z0-9_-]{0,48}") {
        let (a, w) = parse_worker_id(&address);
        prop_assert_eq!(a, address);
        prop_assert_eq!(w, DEFAULT_WORKER_NAME);
    }

    #[test]
    fn test_extranonce1_is_injective_over_u32(a in any::<u32>(), b in any::<u32>()) {
        let (ea, eb) = (extranonce1_for(a as u64), extranonce1_for(b as u64));
        prop_assert_eq!(ea.len(), 8);
        prop_assert!(ea.chars().all(|c| c.is_ascii_hexdigit()));
        prop_assert_eq!(a == b, ea == eb);
    }
}
