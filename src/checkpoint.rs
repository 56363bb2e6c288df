//! Persisted state (§3.5, §6): a checkpoint bundles the five axis specs, the quadrature
//! constants the binary was compiled with, and the raw `val_prev` buffer, so that decoding
//! can verify a saved mesh is compatible before trusting its buffer layout.

use crate::error::{Error, Result};
use crate::hermite::{HERMITE_KNOTS, HERMITE_W};
use crate::mesh::{AxisSpec, Mesh};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// The on-disk representation of a mesh's probability field, serialized with `bincode` the
/// same way the codebase this crate is grounded on persists its own grid state: a flat
/// `serde`-derived struct, no separate framing format layered on top.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Checkpoint {
    r: AxisSpec,
    phi: AxisSpec,
    z: AxisSpec,
    mom1: AxisSpec,
    mom2: AxisSpec,
    hermite_knots: usize,
    hermite_w: Vec<f64>,
    val_prev: Vec<f64>,
}

impl Checkpoint {
    /// Captures `mesh`'s axis specs, `val_prev`, and the quadrature constants currently
    /// compiled into this binary.
    #[must_use]
    pub fn capture(mesh: &Mesh) -> Self {
        let (r, phi, z, mom1, mom2) = mesh.axis_specs();
        Self {
            r,
            phi,
            z,
            mom1,
            mom2,
            hermite_knots: HERMITE_KNOTS,
            hermite_w: HERMITE_W.to_vec(),
            val_prev: mesh.val_prev().to_vec(),
        }
    }

    /// Serializes `self` into `writer`. Writing is not buffered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Checkpoint`] if the underlying `bincode` encoder fails.
    pub fn write(&self, writer: impl Write) -> Result<()> {
        bincode::serialize_into(writer, self).map_err(|e| Error::Checkpoint(e.to_string()))
    }

    /// Deserializes a checkpoint from `reader`. Reading is not buffered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Checkpoint`] if the payload is malformed.
    pub fn read(reader: impl Read) -> Result<Self> {
        bincode::deserialize_from(reader).map_err(|e| Error::Checkpoint(e.to_string()))
    }

    /// Reconstructs the [`Mesh`] this checkpoint was captured from and restores its
    /// `val_prev` buffer (`val_next` starts zeroed, as after any fresh [`Mesh::new`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Checkpoint`] if `hermite_knots` doesn't match the currently compiled
    /// [`HERMITE_KNOTS`] (the buffer would be laid out for a different quadrature rule), or
    /// if the axis specs no longer produce a mesh of the buffer's stored size.
    pub fn restore(self) -> Result<Mesh> {
        if self.hermite_knots != HERMITE_KNOTS {
            return Err(Error::Checkpoint(format!(
                "checkpoint was produced with HERMITE_KNOTS = {}, but this binary was compiled with {HERMITE_KNOTS}",
                self.hermite_knots
            )));
        }

        let mut mesh = Mesh::new(self.r, self.phi, self.z, self.mom1, self.mom2)?;
        if mesh.size() != self.val_prev.len() {
            return Err(Error::Checkpoint(format!(
                "checkpoint buffer has {} elements, but the reconstructed mesh has size {}",
                self.val_prev.len(),
                mesh.size()
            )));
        }

        mesh.restore_val_prev(self.val_prev);
        Ok(mesh)
    }
}
