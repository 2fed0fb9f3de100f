//! Property tests: every moments mode agrees with batch

mod common;

use common::assert_all_close;
use proptest::prelude::*;
use tiered_algorithms::{distributed_moments, low_order_moments, DenseTable, OnlineMoments};

fn table() -> impl Strategy<Value = DenseTable<f64>> {
    (2usize..60, 1usize..5).prop_flat_map(|(rows, cols)| {
        prop::collection::vec(-1e3f64..1e3, rows * cols)
            .prop_map(move |data| DenseTable::new(rows, cols, data).unwrap())
    })
}

proptest! {
    #[test]
    fn online_matches_batch(data in table(), blocks in 1usize..6) {
        let batch = low_order_moments(&data).unwrap();

        let mut online = OnlineMoments::new().unwrap();
        for block in data.split_rows(blocks) {
            online.update(&block).unwrap();
        }
        prop_assert_eq!(online.nobs(), data.rows());
        let streamed = online.finalize().unwrap();

        assert_all_close(&streamed.mean, &batch.mean, 1e-9);
        assert_all_close(&streamed.variance, &batch.variance, 1e-6);
        prop_assert_eq!(streamed.min, batch.min);
        prop_assert_eq!(streamed.max, batch.max);
    }

    #[test]
    fn distributed_matches_batch(data in table(), parts in 1usize..8) {
        let batch = low_order_moments(&data).unwrap();
        let merged = distributed_moments(&data.split_rows(parts)).unwrap();

        prop_assert_eq!(merged.nobs, batch.nobs);
        assert_all_close(&merged.sum, &batch.sum, 1e-9);
        assert_all_close(&merged.variance, &batch.variance, 1e-6);
    }
}
