//! Seeded train/test row partitioning.

use hs_core::{DataFrame, Error, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Disjoint train/test row indices into a parent frame.
#[derive(Debug, Clone)]
pub struct SplitIndices {
    /// Row indices of the train partition, in ascending order.
    pub train: Vec<usize>,
    /// Row indices of the test partition, in ascending order.
    pub test: Vec<usize>,
}

/// Partition `0..n` into train/test by uniform sampling without replacement.
///
/// The train partition holds `round(n * train_frac)` rows; both partitions
/// keep ascending row order so downstream joins by row identity stay valid.
pub fn train_test_indices(n: usize, train_frac: f64, seed: u64) -> Result<SplitIndices> {
    if n == 0 {
        return Err(Error::Validation("cannot split an empty dataset".to_string()));
    }
    if !(train_frac > 0.0 && train_frac < 1.0) {
        return Err(Error::Validation(format!(
            "train_frac must be in (0, 1), got {train_frac}"
        )));
    }

    let n_train = (n as f64 * train_frac).round() as usize;
    let mut rows: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    rows.shuffle(&mut rng);

    let mut train = rows[..n_train].to_vec();
    let mut test = rows[n_train..].to_vec();
    train.sort_unstable();
    test.sort_unstable();

    Ok(SplitIndices { train, test })
}

/// Split a frame into (train, test) frames.
pub fn train_test_split(
    frame: &DataFrame,
    train_frac: f64,
    seed: u64,
) -> Result<(DataFrame, DataFrame)> {
    let idx = train_test_indices(frame.n_rows(), train_frac, seed)?;
    Ok((frame.take(&idx.train)?, frame.take(&idx.test)?))
}
