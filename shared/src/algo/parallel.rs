//! Parallel processing utilities for image and array operations
//!
//! Both helpers here keep results independent of the rayon thread count:
//! random streams are tied to fixed row chunks, and batch results are
//! merged in input order.

use ndarray::{Array2, ArrayViewMut2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

/// Default number of rows per chunk for [`process_array_in_parallel_chunks`].
pub const DEFAULT_CHUNK_ROWS: usize = 64;

/// Process an Array2 in parallel chunks with deterministic seeding
///
/// The array is split into row-wise chunks. Each chunk gets its own
/// `StdRng` seeded with `seed + chunk_index`, so the output depends only
/// on `seed` and `chunk_size`, never on scheduling.
///
/// # Arguments
/// * `array` - The 2D array to process
/// * `seed` - Base seed for random number generation
/// * `chunk_size` - Rows per chunk, defaults to [`DEFAULT_CHUNK_ROWS`]
/// * `processor` - Closure applied to each chunk with its own RNG
pub fn process_array_in_parallel_chunks<F>(
    mut array: Array2<f64>,
    seed: u64,
    chunk_size: Option<usize>,
    processor: F,
) -> Array2<f64>
where
    F: Fn(&mut ArrayViewMut2<f64>, &mut StdRng) + Send + Sync,
{
    let chunk_size = chunk_size.unwrap_or(DEFAULT_CHUNK_ROWS).max(1);

    array
        .axis_chunks_iter_mut(Axis(0), chunk_size)
        .into_par_iter()
        .enumerate()
        .for_each(|(chunk_idx, mut chunk)| {
            let chunk_seed = seed.wrapping_add(chunk_idx as u64);
            let mut rng = StdRng::seed_from_u64(chunk_seed);
            processor(&mut chunk, &mut rng);
        });

    array
}

/// Map `items` in parallel batches and hand each result to `apply` in input order.
///
/// `map` receives the global index of the item. Results of one batch are
/// collected before any is applied, and batches run one after another, so
/// peak memory is bounded by `batch_size` results while `apply` observes
/// exactly the sequential order.
pub fn map_batches_in_order<T, R, M, A>(items: &[T], batch_size: usize, map: M, mut apply: A)
where
    T: Sync,
    R: Send,
    M: Fn(usize, &T) -> R + Send + Sync,
    A: FnMut(R),
{
    let batch_size = batch_size.max(1);

    for (batch_idx, batch) in items.chunks(batch_size).enumerate() {
        let offset = batch_idx * batch_size;
        let results: Vec<R> = batch
            .par_iter()
            .enumerate()
            .map(|(i, item)| map(offset + i, item))
            .collect();
        results.into_iter().for_each(&mut apply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_chunks_are_seed_deterministic() {
        let fill = |chunk: &mut ArrayViewMut2<f64>, rng: &mut StdRng| {
            chunk.iter_mut().for_each(|v| *v = rng.gen::<f64>());
        };
        let a = process_array_in_parallel_chunks(Array2::zeros((200, 30)), 7, Some(16), fill);
        let b = process_array_in_parallel_chunks(Array2::zeros((200, 30)), 7, Some(16), fill);
        let c = process_array_in_parallel_chunks(Array2::zeros((200, 30)), 8, Some(16), fill);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_batches_apply_in_input_order() {
        let items: Vec<usize> = (0..1000).collect();
        let mut seen = Vec::new();
        map_batches_in_order(&items, 37, |idx, item| (idx, item * 2), |r| seen.push(r));

        assert_eq!(seen.len(), 1000);
        for (i, (idx, doubled)) in seen.iter().enumerate() {
            assert_eq!(*idx, i);
            assert_eq!(*doubled, i * 2);
        }
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let items = [1, 2, 3];
        let mut total = 0;
        map_batches_in_order(&items, 0, |_, v| *v, |v| total += v);
        assert_eq!(total, 6);
    }
}
