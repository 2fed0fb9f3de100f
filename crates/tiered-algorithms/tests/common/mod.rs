//! Shared utilities for integration tests

#![allow(dead_code)]

use parking_lot::{Mutex, MutexGuard};
use tiered_algorithms::DenseTable;

pub use approx::assert_relative_eq;

static CURRENT_CONTEXT_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Serialize tests that swap the process-wide context
pub fn serial() -> MutexGuard<'static, ()> {
    CURRENT_CONTEXT_LOCK.lock()
}

/// Deterministic `rows × cols` table with distinct column scales
pub fn generate_table(rows: usize, cols: usize) -> DenseTable<f64> {
    let data = (0..cols)
        .flat_map(|j| (0..rows).map(move |i| ((i * (j + 3)) as f64 * 0.37).sin() * (j + 1) as f64 + j as f64))
        .collect();
    DenseTable::new(rows, cols, data).unwrap()
}

pub fn assert_all_close(actual: &[f64], expected: &[f64], epsilon: f64) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert_relative_eq!(*a, *e, epsilon = epsilon, max_relative = epsilon);
    }
}
