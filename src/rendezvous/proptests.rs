//! Property-based tests for the rendezvous slot

use super::*;
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

proptest! {
    /// Deliveries made before anyone waits collapse to the last one.
    #[test]
    fn last_write_wins(values in prop::collection::vec("[a-z]{1,12}", 1..8)) {
        let rv = Rendezvous::new(None::<String>);
        for value in &values {
            rv.signal(|slot| -> Result<(), ()> {
                *slot = Some(value.clone());
                Ok(())
            }).unwrap();
        }

        let got = runtime().block_on(rv.wait(Some(Duration::from_millis(10)), Option::take));
        prop_assert_eq!(got.as_ref(), values.last());
    }

    /// Any number of timed-out waits never eats a later delivery.
    #[test]
    fn timeouts_never_lose_a_value(timeouts in 0usize..4, value in "[a-z]{1,12}") {
        let rt = runtime();
        let rv = Rendezvous::new(None::<String>);

        for _ in 0..timeouts {
            let got = rt.block_on(rv.wait(Some(Duration::from_millis(1)), Option::take));
            prop_assert!(got.is_none());
        }

        rv.signal(|slot| -> Result<(), ()> {
            *slot = Some(value.clone());
            Ok(())
        }).unwrap();

        let got = rt.block_on(rv.wait(Some(Duration::from_millis(10)), Option::take));
        prop_assert_eq!(got, Some(value));
    }
}
