//! The collective transport used by the [`crate::reducer`] to sum `val_next` across workers.
//!
//! Shipping an actual distributed-process transport (e.g. an MPI binding) is out of scope per
//! the flat-index-range non-goal (§1); this is the seam a deployment would plug one into.

use crate::error::{Error, Result};

/// A single collective operation: sum `buf` element-wise across all cooperating workers and
/// leave the result in `buf` on every worker (an all-reduce).
pub trait ReduceTransport {
    /// Performs the all-reduce-sum in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReductionFailed`] if the collective could not complete.
    fn all_reduce_sum(&self, buf: &mut [f64]) -> Result<()>;
}

/// The single-worker transport: the "all-reduce" degenerates to the identity, since there is
/// only one partition to sum.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleWorker;

impl ReduceTransport for SingleWorker {
    fn all_reduce_sum(&self, _buf: &mut [f64]) -> Result<()> {
        Ok(())
    }
}

/// An in-process stand-in for a multi-worker collective: sums a fixed set of same-shaped
/// partitions into `buf` in place of a real distributed all-reduce. Exercises the
/// all-reduce-sum contract (including its failure path) without requiring a real cluster or
/// an MPI dependency.
pub struct LocalWorkers {
    partitions: Vec<Vec<f64>>,
}

impl LocalWorkers {
    /// Builds a transport that sums `partitions` (each expected to have the same length as
    /// the buffer passed to [`ReduceTransport::all_reduce_sum`]) on every call.
    #[must_use]
    pub fn new(partitions: Vec<Vec<f64>>) -> Self {
        Self { partitions }
    }
}

impl ReduceTransport for LocalWorkers {
    fn all_reduce_sum(&self, buf: &mut [f64]) -> Result<()> {
        for partition in &self.partitions {
            if partition.len() != buf.len() {
                return Err(Error::ReductionFailed(format!(
                    "partition length {} does not match buffer length {}",
                    partition.len(),
                    buf.len()
                )));
            }
        }

        buf.iter_mut().for_each(|v| *v = 0.0);
        for partition in &self.partitions {
            for (acc, &v) in buf.iter_mut().zip(partition) {
                *acc += v;
            }
        }

        Ok(())
    }
}
