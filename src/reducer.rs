//! C4: sums `val_next` across workers into `val_prev`, then zeroes `val_next` (§4.4).

use crate::error::Result;
use crate::mesh::Mesh;
use crate::transport::ReduceTransport;
use tracing::debug;

/// Finishes the in-progress step: runs the collective all-reduce over `mesh.val_next` into
/// `mesh.val_prev`, then zeroes `mesh.val_next`. With [`crate::transport::SingleWorker`] the
/// reduction degenerates to a plain copy, matching the reference implementation's non-MPI
/// build.
///
/// # Errors
///
/// Returns [`crate::error::Error::ReductionFailed`] if `transport` reports a failure; in that
/// case `val_next` is left untouched (discarded by the caller, per §7) and `val_prev` is not
/// updated.
pub fn finishstep(mesh: &mut Mesh, transport: &impl ReduceTransport) -> Result<()> {
    let mut reduced = mesh.val_next().to_vec();
    transport.all_reduce_sum(&mut reduced)?;

    mesh.val_prev = reduced;
    mesh.val_next_mut().iter_mut().for_each(|v| *v = 0.0);

    debug!(size = mesh.size(), "finished step: val_next reduced into val_prev");

    Ok(())
}
