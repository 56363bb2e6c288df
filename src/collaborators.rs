//! Narrow abstract interfaces to the engine's external collaborators (§6, §9): the
//! magnetic-field evaluator, the plasma background, the wall geometry, and the orbit-push
//! oracle. None of these are implemented by this crate for production use — a deployment
//! supplies concrete implementations backed by whatever field/plasma/orbit code it already
//! has. This crate ships test doubles only (see each trait's module tests).

use crate::mesh::Mesh;
use crate::particle::PseudoParticle;
use std::ops::Range;

/// Normalized poloidal flux coordinate evaluator.
pub trait MagneticField: Sync {
    /// Returns `ρ_pol(R, z)`, 0 at the magnetic axis and 1 at the separatrix.
    fn rho_pol(&self, r: f64, z: f64) -> f64;
}

/// Plasma species-density background, queried at a flux-surface label.
pub trait PlasmaBackground: Sync {
    /// Returns one density per species (`[m^-3]`) at the given `ρ_pol`.
    fn densities(&self, rho_pol: f64) -> Vec<f64>;
}

/// 2D wall contour membership test.
pub trait Wall2D: Sync {
    /// Returns `true` if `(R, z)` lies inside the first-wall contour.
    fn contains(&self, r: f64, z: f64) -> bool;
}

/// Six parallel arrays of length `(stop - start) * HERMITE_KNOTS`, produced by an
/// [`OrbitPush`] for a contiguous mesh-element range (§3.3, §6).
pub struct PushResult {
    /// Final `R` coordinate of each knot endpoint.
    pub r: Vec<f64>,
    /// Final `φ` coordinate of each knot endpoint, wrapped to the mesh's periodic interval.
    pub phi: Vec<f64>,
    /// Final `z` coordinate of each knot endpoint.
    pub z: Vec<f64>,
    /// Final `p∥` coordinate of each knot endpoint.
    pub mom1: Vec<f64>,
    /// Final `p⊥` coordinate of each knot endpoint.
    pub mom2: Vec<f64>,
    /// Fate code in `{-1, 0, 1, 2}` for each knot endpoint.
    pub fate: Vec<i32>,
}

/// The orbit-push oracle: given the seeded state for a mesh-element range, produces knot
/// endpoints and fates. Treated as an opaque collaborator by the [`crate::updater`]; this
/// crate never integrates an orbit itself (§1 Out of scope).
pub trait OrbitPush: Sync {
    /// Pushes every particle whose `origin` falls in `range` forward by `dt` (with
    /// `sub_cycles` RK4 substeps, or whatever integration scheme the implementation uses),
    /// returning `HERMITE_KNOTS` stochastic endpoints per particle.
    fn push(
        &self,
        mesh: &Mesh,
        range: Range<usize>,
        particles: &[PseudoParticle],
        mass: f64,
        charge: f64,
        dt: f64,
        sub_cycles: u32,
    ) -> PushResult;
}
