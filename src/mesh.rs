//! The 5D phase-space mesh: abscissae, value buffers, and indexing.

use crate::convert::{f64_from_usize, usize_from_f64_floor};
use crate::error::{Error, Result};

/// One axis of the mesh, given as `(min, max, count)`. `count` is the number of cells the
/// caller asked for; the stored number of abscissae depends on whether the axis is periodic
/// (see [`Mesh::new`]).
#[derive(Clone, Copy, Debug, serde::Deserialize, serde::Serialize)]
pub struct AxisSpec {
    /// Lower bound of the axis.
    pub min: f64,
    /// Upper bound of the axis.
    pub max: f64,
    /// Number of cells requested along the axis.
    pub count: usize,
}

impl AxisSpec {
    /// Constructor. Mainly exists to make call sites less verbose.
    #[must_use]
    pub const fn new(min: f64, max: f64, count: usize) -> Self {
        Self { min, max, count }
    }

    fn validate(&self) -> Result<()> {
        if !(self.max > self.min) {
            return Err(Error::InvalidAxis(format!(
                "max ({}) must be greater than min ({})",
                self.max, self.min
            )));
        }
        if self.count == 0 {
            return Err(Error::InvalidAxis("count must be non-zero".to_owned()));
        }
        Ok(())
    }

    fn uniform_abscissae(self) -> Vec<f64> {
        let step = (self.max - self.min) / f64_from_usize(self.count);
        (0..=self.count)
            .map(|i| f64_from_usize(i).mul_add(step, self.min))
            .collect()
    }

    fn periodic_abscissae(self) -> Vec<f64> {
        let step = (self.max - self.min) / f64_from_usize(self.count + 1);
        (0..self.count)
            .map(|i| f64_from_usize(i).mul_add(step, self.min))
            .collect()
    }
}

/// The 5D `(R, φ, z, p∥, p⊥)` mesh: axis abscissae and the two probability value buffers.
///
/// `r`, `z`, `mom1`, `mom2` store `count + 1` abscissae (endpoints inclusive on a uniform
/// grid); `phi` stores `count` abscissae covering the periodic interval `[min, max)`. `r` is
/// the fastest-varying axis in the canonical linearization, `phi` is periodic-aware on its
/// own linearization band
#[derive(Clone)]
pub struct Mesh {
    r: Vec<f64>,
    phi: Vec<f64>,
    /// `φ_max - φ_min` as given to [`Mesh::new`]; kept explicitly because it cannot always be
    /// recovered from spacing alone (a single-cell `φ` axis stores only one abscissa).
    phi_period: f64,
    z: Vec<f64>,
    mom1: Vec<f64>,
    mom2: Vec<f64>,
    /// `val_prev[i]`: probability field at the start of the current step.
    pub(crate) val_prev: Vec<f64>,
    /// `val_next[i]`: accumulator for the step in progress.
    pub(crate) val_next: Vec<f64>,
}

impl Mesh {
    /// Builds a mesh from five axis specs, in the order `(R, φ, z, p∥, p⊥)`. Zeroes both
    /// value buffers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAxis`] if any `max <= min` or any `count == 0`.
    pub fn new(
        r: AxisSpec,
        phi: AxisSpec,
        z: AxisSpec,
        mom1: AxisSpec,
        mom2: AxisSpec,
    ) -> Result<Self> {
        for spec in [r, phi, z, mom1, mom2] {
            spec.validate()?;
        }

        let phi_period = phi.max - phi.min;
        let r = r.uniform_abscissae();
        let z = z.uniform_abscissae();
        let mom1 = mom1.uniform_abscissae();
        let mom2 = mom2.uniform_abscissae();
        let phi = phi.periodic_abscissae();

        let size = r.len() * phi.len() * z.len() * mom1.len() * mom2.len();

        Ok(Self {
            r,
            phi,
            phi_period,
            z,
            mom1,
            mom2,
            val_prev: vec![0.0; size],
            val_next: vec![0.0; size],
        })
    }

    /// Number of stored `R` abscissae (`count_r + 1`).
    #[must_use]
    pub fn n_r(&self) -> usize {
        self.r.len()
    }

    /// Number of stored `φ` abscissae (`count_phi`).
    #[must_use]
    pub fn n_phi(&self) -> usize {
        self.phi.len()
    }

    /// Number of stored `z` abscissae (`count_z + 1`).
    #[must_use]
    pub fn n_z(&self) -> usize {
        self.z.len()
    }

    /// Number of stored `p∥` abscissae (`count_mom1 + 1`).
    #[must_use]
    pub fn n_mom1(&self) -> usize {
        self.mom1.len()
    }

    /// Number of stored `p⊥` abscissae (`count_mom2 + 1`).
    #[must_use]
    pub fn n_mom2(&self) -> usize {
        self.mom2.len()
    }

    /// Total number of mesh vertices; the length of each value buffer.
    #[must_use]
    pub fn size(&self) -> usize {
        self.val_prev.len()
    }

    /// Recovers the five [`AxisSpec`]s this mesh was constructed from, in `(R, φ, z, p∥,
    /// p⊥)` order. Used by [`crate::checkpoint`] to persist a reconstructible mesh.
    #[must_use]
    pub fn axis_specs(&self) -> (AxisSpec, AxisSpec, AxisSpec, AxisSpec, AxisSpec) {
        let uniform = |axis: &[f64]| AxisSpec::new(axis[0], axis[axis.len() - 1], axis.len() - 1);
        (
            uniform(&self.r),
            AxisSpec::new(self.phi[0], self.phi[0] + self.phi_period, self.phi.len()),
            uniform(&self.z),
            uniform(&self.mom1),
            uniform(&self.mom2),
        )
    }

    /// `R` abscissae.
    #[must_use]
    pub fn r(&self) -> &[f64] {
        &self.r
    }

    /// `φ` abscissae.
    #[must_use]
    pub fn phi(&self) -> &[f64] {
        &self.phi
    }

    /// `z` abscissae.
    #[must_use]
    pub fn z(&self) -> &[f64] {
        &self.z
    }

    /// `p∥` abscissae.
    #[must_use]
    pub fn mom1(&self) -> &[f64] {
        &self.mom1
    }

    /// `p⊥` abscissae.
    #[must_use]
    pub fn mom2(&self) -> &[f64] {
        &self.mom2
    }

    /// The probability field at the start of the current step.
    #[must_use]
    pub fn val_prev(&self) -> &[f64] {
        &self.val_prev
    }

    /// The accumulator for the step in progress.
    #[must_use]
    pub fn val_next(&self) -> &[f64] {
        &self.val_next
    }

    /// Exclusive access to the step-in-progress accumulator, for the [`crate::updater`].
    pub(crate) fn val_next_mut(&mut self) -> &mut [f64] {
        &mut self.val_next
    }

    /// Overwrites `val_prev` wholesale, for [`crate::checkpoint::Checkpoint::restore`]. The
    /// caller is responsible for having checked `buf.len() == self.size()`.
    pub(crate) fn restore_val_prev(&mut self, buf: Vec<f64>) {
        self.val_prev = buf;
    }

    /// A read-only view of the axes and `val_prev`, for [`crate::interpolation::interpolate`].
    #[must_use]
    pub fn view(&self) -> MeshView<'_> {
        MeshView {
            r: &self.r,
            phi: &self.phi,
            phi_period: self.phi_period,
            z: &self.z,
            mom1: &self.mom1,
            mom2: &self.mom2,
            val_prev: &self.val_prev,
        }
    }

    /// Splits the mesh into a read-only view of the axes and `val_prev`, and an exclusive
    /// borrow of `val_next`. This is what lets the [`crate::updater`] read `val_prev` through
    /// the interpolator while writing `val_next` at the same time: the two halves borrow
    /// disjoint fields, so both can be alive together even though they came from a single
    /// `&mut Mesh`.
    pub(crate) fn split_for_update(&mut self) -> (MeshView<'_>, &mut [f64]) {
        let view = MeshView {
            r: &self.r,
            phi: &self.phi,
            phi_period: self.phi_period,
            z: &self.z,
            mom1: &self.mom1,
            mom2: &self.mom2,
            val_prev: &self.val_prev,
        };
        (view, &mut self.val_next)
    }

    /// Maps the five per-axis vertex indices to the canonical flat index (§3.1): `r` is the
    /// fastest-varying axis, `mom2` the slowest.
    #[must_use]
    pub fn linear_index(&self, i_r: usize, i_phi: usize, i_z: usize, i_mom1: usize, i_mom2: usize) -> usize {
        self.view().linear_index(i_r, i_phi, i_z, i_mom1, i_mom2)
    }

    /// Inverse of the canonical linearization: recovers the phase-space coordinates stored
    /// at flat index `idx`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if `idx >= size()`.
    pub fn index_to_position(&self, idx: usize) -> Result<(f64, f64, f64, f64, f64)> {
        let size = self.size();
        if idx >= size {
            return Err(Error::OutOfRange { idx, size });
        }

        let n_r = self.r.len();
        let n_z = self.z.len();
        let n_phi = self.phi.len();
        let n_mom1 = self.mom1.len();

        let mut rem = idx;
        let i_mom2 = rem / (n_r * n_z * n_phi * n_mom1);
        rem -= i_mom2 * (n_r * n_z * n_phi * n_mom1);
        let i_mom1 = rem / (n_r * n_z * n_phi);
        rem -= i_mom1 * (n_r * n_z * n_phi);
        let i_phi = rem / (n_r * n_z);
        rem -= i_phi * (n_r * n_z);
        let i_z = rem / n_r;
        let i_r = rem - i_z * n_r;

        Ok((
            self.r[i_r],
            self.phi[i_phi],
            self.z[i_z],
            self.mom1[i_mom1],
            self.mom2[i_mom2],
        ))
    }

    /// Number of mesh *cells* (not vertices) along each axis; used by the [`crate::seeder`]
    /// for importance-weighted binning. `φ` has `n_phi` cells (it wraps), the other axes
    /// have one fewer cell than stored abscissae.
    #[must_use]
    pub fn cell_counts(&self) -> (usize, usize, usize, usize, usize) {
        (
            self.r.len() - 1,
            self.phi.len(),
            self.z.len() - 1,
            self.mom1.len() - 1,
            self.mom2.len() - 1,
        )
    }

    /// Total number of mesh cells, the product of [`Mesh::cell_counts`].
    #[must_use]
    pub fn n_cells(&self) -> usize {
        let (nr, nphi, nz, nm1, nm2) = self.cell_counts();
        nr * nphi * nz * nm1 * nm2
    }

    /// Locates the mesh cell containing `(r, phi, z, mom1, mom2)`, clamped to the valid cell
    /// range on each axis. Used for importance-sampling histogram binning, where a point
    /// slightly outside the mesh should still land in the nearest edge cell rather than be
    /// dropped.
    #[must_use]
    pub fn cell_of(&self, r: f64, phi: f64, z: f64, mom1: f64, mom2: f64) -> (usize, usize, usize, usize, usize) {
        let (nr, nphi, nz, nm1, nm2) = self.cell_counts();
        let clamp_axis = |x: f64, axis: &[f64], n_cells: usize| -> usize {
            let delta = axis[1] - axis[0];
            let raw = (x - axis[0]) / delta;
            usize_from_f64_floor(raw).map_or(0, |i| i.min(n_cells - 1))
        };
        let i_phi = {
            let delta = self.phi_step();
            let raw = (phi - self.phi[0]).rem_euclid(self.period_phi()) / delta;
            usize_from_f64_floor(raw).map_or(0, |i| i.min(nphi - 1))
        };
        (
            clamp_axis(r, &self.r, nr),
            i_phi,
            clamp_axis(z, &self.z, nz),
            clamp_axis(mom1, &self.mom1, nm1),
            clamp_axis(mom2, &self.mom2, nm2),
        )
    }

    /// Centroid coordinates of mesh cell `(i_r, i_phi, i_z, i_mom1, i_mom2)`.
    #[must_use]
    pub fn cell_centroid(&self, i_r: usize, i_phi: usize, i_z: usize, i_mom1: usize, i_mom2: usize) -> (f64, f64, f64, f64, f64) {
        let mid = |axis: &[f64], i: usize| -> f64 {
            if i + 1 < axis.len() {
                0.5 * (axis[i] + axis[i + 1])
            } else {
                // last phi cell wraps to the first abscissa plus one period
                0.5 * (axis[i] + (axis[0] + self.period_phi()))
            }
        };
        (
            mid(&self.r, i_r),
            mid(&self.phi, i_phi),
            mid(&self.z, i_z),
            mid(&self.mom1, i_mom1),
            mid(&self.mom2, i_mom2),
        )
    }

    /// Linearizes a mesh-cell multi-index into a flat cell index, using the same
    /// axis-ordering convention as [`Mesh::linear_index`] but over cell counts rather than
    /// vertex counts.
    #[must_use]
    pub fn linear_cell_index(&self, i_r: usize, i_phi: usize, i_z: usize, i_mom1: usize, i_mom2: usize) -> usize {
        let (nr, nphi, nz, nm1, _nm2) = self.cell_counts();
        i_mom2_linearize(i_r, i_phi, i_z, i_mom1, i_mom2, nr, nphi, nz, nm1)
    }

    fn phi_step(&self) -> f64 {
        self.phi_period / f64_from_usize(self.phi.len())
    }

    fn period_phi(&self) -> f64 {
        self.phi_period
    }

    /// `φ_max - φ_min` as given to [`Mesh::new`].
    #[must_use]
    pub fn phi_period(&self) -> f64 {
        self.phi_period
    }
}

#[allow(clippy::too_many_arguments)]
fn i_mom2_linearize(
    i_r: usize,
    i_phi: usize,
    i_z: usize,
    i_mom1: usize,
    i_mom2: usize,
    n_r: usize,
    n_phi: usize,
    n_z: usize,
    n_mom1: usize,
) -> usize {
    i_mom2 * (n_r * n_z * n_phi * n_mom1)
        + i_mom1 * (n_r * n_z * n_phi)
        + i_phi * (n_r * n_z)
        + i_z * n_r
        + i_r
}

/// A read-only borrow of a [`Mesh`]'s axes and `val_prev`, disjoint from `val_next`. See
/// [`Mesh::split_for_update`] for why this exists.
#[derive(Clone, Copy)]
pub struct MeshView<'a> {
    r: &'a [f64],
    phi: &'a [f64],
    phi_period: f64,
    z: &'a [f64],
    mom1: &'a [f64],
    mom2: &'a [f64],
    val_prev: &'a [f64],
}

impl<'a> MeshView<'a> {
    /// `R` abscissae.
    #[must_use]
    pub fn r(&self) -> &'a [f64] {
        self.r
    }

    /// `φ` abscissae.
    #[must_use]
    pub fn phi(&self) -> &'a [f64] {
        self.phi
    }

    /// `z` abscissae.
    #[must_use]
    pub fn z(&self) -> &'a [f64] {
        self.z
    }

    /// `p∥` abscissae.
    #[must_use]
    pub fn mom1(&self) -> &'a [f64] {
        self.mom1
    }

    /// `p⊥` abscissae.
    #[must_use]
    pub fn mom2(&self) -> &'a [f64] {
        self.mom2
    }

    /// The probability field at the start of the current step.
    #[must_use]
    pub fn val_prev(&self) -> &'a [f64] {
        self.val_prev
    }

    /// `φ_max - φ_min` as given to [`Mesh::new`].
    #[must_use]
    pub fn phi_period(&self) -> f64 {
        self.phi_period
    }

    /// Maps the five per-axis vertex indices to the canonical flat index (§3.1).
    #[must_use]
    pub fn linear_index(&self, i_r: usize, i_phi: usize, i_z: usize, i_mom1: usize, i_mom2: usize) -> usize {
        i_mom2_linearize(i_r, i_phi, i_z, i_mom1, i_mom2, self.r.len(), self.phi.len(), self.z.len(), self.mom1.len())
    }
}
