//! Ambient configuration: a validated, in-memory run description (§3.4). This crate performs
//! no flag or file parsing — `EngineConfig` is the shape an outer CLI or config-file loader
//! (out of scope, §1) would populate and hand to [`crate::engine::Engine::init`].

use crate::mesh::AxisSpec;
use serde::{Deserialize, Serialize};

/// One of the four importance-sampling modes a run is configured for, carrying only the
/// plain data needed to describe the choice (not the collaborator references themselves,
/// which are supplied at seed time and are not serializable). See
/// [`crate::seeder::SeedMode`] for the runtime counterpart that actually drives seeding.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum SeedModeKind {
    /// `n_per_vertex` particles placed directly at every in-wall vertex.
    Uniform,
    /// Importance-sampled by a user-supplied probability field.
    UserProbability,
    /// Importance-sampled by the plasma density background.
    PlasmaDensity,
    /// Importance-sampled by a histogram of externally supplied particles.
    FromInputParticles,
}

/// The validated, serializable shape of a full engine run: the five axis specs, species
/// parameters, the time-stepping schedule, and the seeding choice (§3.4).
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct EngineConfig {
    /// `R` axis spec.
    pub r: AxisSpec,
    /// `φ` axis spec (periodic).
    pub phi: AxisSpec,
    /// `z` axis spec.
    pub z: AxisSpec,
    /// `p∥` axis spec.
    pub mom1: AxisSpec,
    /// `p⊥` axis spec.
    pub mom2: AxisSpec,
    /// Species mass `[kg]`.
    pub mass: f64,
    /// Species charge `[C]`.
    pub charge: f64,
    /// Orbit-push time step `[s]`.
    pub dt: f64,
    /// Number of integration sub-cycles per push.
    pub sub_cycles: u32,
    /// Which importance-sampling mode this run is configured for.
    pub seed_mode: SeedModeKind,
    /// Total pseudo-particle budget (ignored by [`SeedModeKind::Uniform`], which instead
    /// uses `n_per_vertex`).
    pub n_total: usize,
    /// Particles placed per in-wall vertex under [`SeedModeKind::Uniform`].
    pub n_per_vertex: usize,
    /// Whether particles are placed at cell vertices with a Hermite momentum expansion
    /// (`true`) or at uniform random points in the cell's interior (`false`).
    pub use_hermite: bool,
    /// Explicit PRNG seed, for reproducible seeding (§4.5 determinism).
    pub rng_seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_an_outer_json_format() {
        let config = EngineConfig {
            r: AxisSpec::new(0.0, 1.0, 8),
            phi: AxisSpec::new(0.0, std::f64::consts::TAU, 8),
            z: AxisSpec::new(-1.0, 1.0, 8),
            mom1: AxisSpec::new(-1.0, 1.0, 8),
            mom2: AxisSpec::new(0.0, 1.0, 8),
            mass: 3.343_583_7e-27,
            charge: 1.602_176_6e-19,
            dt: 1e-7,
            sub_cycles: 4,
            seed_mode: SeedModeKind::PlasmaDensity,
            n_total: 1_000_000,
            n_per_vertex: 0,
            use_hermite: true,
            rng_seed: 0xdead_beef,
        };

        let json = serde_json::to_string(&config).unwrap();
        let restored: EngineConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.seed_mode, config.seed_mode);
        assert_eq!(restored.n_total, config.n_total);
        assert!((restored.mass - config.mass).abs() < f64::EPSILON);
    }
}
