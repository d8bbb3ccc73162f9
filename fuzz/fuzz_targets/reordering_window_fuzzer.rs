//! Fuzz target for ReorderingWindow
//!
//! Marks arbitrary stream numbers seen and checks the window against a
//! reference set of everything marked so far.
//!
//! # Invariants
//!
//! - Never panics
//! - The base is never seen, and never moves backwards
//! - A number is accepted at most once
//! - Numbers below the base are always rejected
//! - Every added number is unseen; every removed number was seen

#![no_main]

use std::collections::BTreeSet;

use hedgerow_transport::{KeyStoreError, ReorderingWindow, constants::REORDERING_WINDOW_SIZE};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|ops: Vec<u8>| {
    let mut window = ReorderingWindow::new();
    let mut seen = BTreeSet::new();

    for op in ops {
        // Offsets reach one window past the top so rejections get exercised
        let stream_number = window.base() + u64::from(op) % (2 * REORDERING_WINDOW_SIZE as u64);
        let base = window.base();

        match window.set_seen(stream_number) {
            Ok(change) => {
                assert!(seen.insert(stream_number));
                for n in &change.removed {
                    assert!(seen.contains(n));
                }
                for n in &change.added {
                    assert!(!seen.contains(n));
                }
            },
            Err(KeyStoreError::StreamNumberAlreadySeen { stream_number: n }) => {
                assert!(seen.contains(&n));
            },
            Err(KeyStoreError::StreamNumberOutsideWindow { stream_number: n, .. }) => {
                assert!(n >= base + REORDERING_WINDOW_SIZE as u64);
            },
            Err(e) => panic!("unexpected error: {e}"),
        }

        assert!(window.base() >= base);
        assert!(!seen.contains(&window.base()));
        assert_eq!(window.bitmap() & 1, 0);
        if window.base() > 0 {
            assert!(window.set_seen(window.base() - 1).is_err());
        }
    }
});
