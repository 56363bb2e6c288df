//! C6: the engine state machine that owns a [`Mesh`] and a pseudo-particle ensemble, and
//! drives the Updater and Reducer across steps (§4.6).

use crate::checkpoint::Checkpoint;
use crate::collaborators::{OrbitPush, Wall2D};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::particle::PseudoParticle;
use crate::reducer;
use crate::seeder::{self, SeedMode};
use crate::transport::ReduceTransport;
use crate::updater;
use std::io::{Read, Write};
use tracing::{debug, info};

/// `Uninitialized → Seeded → StepInProgress ⇄ StepReady → Finished` (§4.6).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Uninitialized,
    Seeded,
    StepInProgress,
    StepReady,
    Finished,
}

/// Owns a [`Mesh`], the seeded pseudo-particle ensemble, and a private thread pool the
/// Updater's per-index fan-out runs on. The pool is owned rather than borrowed from
/// `rayon`'s global default so that embedding this engine inside a larger process never
/// contends with or reconfigures that process's own pool (§9 open question).
pub struct Engine {
    mesh: Option<Mesh>,
    particles: Vec<PseudoParticle>,
    pool: rayon::ThreadPool,
    state: State,
}

impl Engine {
    /// Builds an engine with a private thread pool of `num_threads` workers (`0` lets
    /// `rayon` pick a default based on available parallelism).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`] if the thread pool could not be built.
    pub fn new(num_threads: usize) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if num_threads > 0 {
            builder = builder.num_threads(num_threads);
        }
        let pool = builder.build().map_err(|e| Error::Other(e.into()))?;

        Ok(Self { mesh: None, particles: Vec::new(), pool, state: State::Uninitialized })
    }

    /// Constructs the mesh from `config` and seeds the initial pseudo-particle ensemble,
    /// moving `Uninitialized → Seeded`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAxis`] if `config`'s axis specs are malformed, or
    /// [`Error::InvalidState`] if the engine has already been initialized.
    pub fn init(&mut self, config: &EngineConfig, mode: &SeedMode<'_>, wall: &dyn Wall2D) -> Result<()> {
        if self.state != State::Uninitialized {
            return Err(Error::InvalidState(format!("init called from {:?}, expected Uninitialized", self.state)));
        }

        let mesh = Mesh::new(config.r, config.phi, config.z, config.mom1, config.mom2)?;
        let particles = seeder::seed(&mesh, mode, wall, config.mass, config.charge, 0.0, config.use_hermite, config.rng_seed);
        info!(size = mesh.size(), particles = particles.len(), "engine initialized");

        self.mesh = Some(mesh);
        self.particles = particles;
        self.state = State::Seeded;
        Ok(())
    }

    /// Re-seeds the pseudo-particle ensemble without rebuilding the mesh. Valid from any
    /// state except `Uninitialized` and `Finished`; used after [`Engine::restore_checkpoint`]
    /// (which restores `val_prev` but not a particle ensemble, since particles aren't part of
    /// the persisted state, §6) or to change the seeding mode mid-run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if no mesh has been constructed yet.
    pub fn reseed(&mut self, config: &EngineConfig, mode: &SeedMode<'_>, wall: &dyn Wall2D) -> Result<()> {
        let mesh = self.mesh.as_ref().ok_or_else(|| Error::InvalidState("reseed called before a mesh exists".to_owned()))?;
        self.particles = seeder::seed(mesh, mode, wall, config.mass, config.charge, 0.0, config.use_hermite, config.rng_seed);
        Ok(())
    }

    /// Runs one full step: the Updater consumes `orbit_push`'s output for the whole mesh,
    /// then the Reducer folds `val_next` into `val_prev` via `transport`. Transitions
    /// `Seeded|StepReady → StepInProgress → StepReady`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if called from `Uninitialized` or `Finished`, or
    /// [`Error::ReductionFailed`] if `transport` reports a failure (in which case `val_next`
    /// is discarded and `val_prev` is left at its pre-step value).
    pub fn step(&mut self, orbit_push: &dyn OrbitPush, transport: &impl ReduceTransport, config: &EngineConfig) -> Result<()> {
        if !matches!(self.state, State::Seeded | State::StepReady) {
            return Err(Error::InvalidState(format!("step called from {:?}, expected Seeded or StepReady", self.state)));
        }
        self.state = State::StepInProgress;

        let mesh = self.mesh.as_mut().expect("Seeded/StepReady implies a mesh exists");
        let size = mesh.size();
        let push = orbit_push.push(mesh, 0..size, &self.particles, config.mass, config.charge, config.dt, config.sub_cycles);

        let pool = &self.pool;
        let (view, val_next) = mesh.split_for_update();
        pool.install(|| updater::update(view, val_next, 0, size, &push));
        debug!(size, "updater pass complete");

        reducer::finishstep(mesh, transport)?;
        self.state = State::StepReady;
        Ok(())
    }

    /// Releases the mesh buffers and moves to `Finished`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the engine is already `Finished`.
    pub fn finalize(&mut self) -> Result<()> {
        if self.state == State::Finished {
            return Err(Error::InvalidState("finalize called on an already-finished engine".to_owned()));
        }
        self.mesh = None;
        self.particles.clear();
        self.state = State::Finished;
        Ok(())
    }

    /// The current probability field, or `None` once [`Engine::finalize`] has run.
    #[must_use]
    pub fn val_prev(&self) -> Option<&[f64]> {
        self.mesh.as_ref().map(Mesh::val_prev)
    }

    /// The current pseudo-particle ensemble.
    #[must_use]
    pub fn particles(&self) -> &[PseudoParticle] {
        &self.particles
    }

    /// Writes a [`Checkpoint`] of the current mesh to `writer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if no mesh exists (`Uninitialized` or `Finished`), or
    /// [`Error::Checkpoint`] if encoding fails.
    pub fn save_checkpoint(&self, writer: impl Write) -> Result<()> {
        let mesh = self.mesh.as_ref().ok_or_else(|| Error::InvalidState("save_checkpoint called with no mesh".to_owned()))?;
        Checkpoint::capture(mesh).write(writer)
    }

    /// Reconstructs an engine from a checkpoint, in the `StepReady` state (ready for another
    /// `step` once a particle ensemble has been supplied via [`Engine::reseed`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Checkpoint`] if the payload is malformed or incompatible, or
    /// [`Error::Other`] if the thread pool could not be built.
    pub fn restore_checkpoint(reader: impl Read, num_threads: usize) -> Result<Self> {
        let mesh = Checkpoint::read(reader)?.restore()?;
        let mut builder = rayon::ThreadPoolBuilder::new();
        if num_threads > 0 {
            builder = builder.num_threads(num_threads);
        }
        let pool = builder.build().map_err(|e| Error::Other(e.into()))?;

        Ok(Self { mesh: Some(mesh), particles: Vec::new(), pool, state: State::StepReady })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeedModeKind;
    use crate::mesh::AxisSpec;
    use crate::particle::InputParticle;

    struct NoWall;
    impl Wall2D for NoWall {
        fn contains(&self, _r: f64, _z: f64) -> bool {
            true
        }
    }

    struct IdentityPush;
    impl OrbitPush for IdentityPush {
        fn push(
            &self,
            mesh: &Mesh,
            range: std::ops::Range<usize>,
            _particles: &[PseudoParticle],
            _mass: f64,
            _charge: f64,
            _dt: f64,
            _sub_cycles: u32,
        ) -> crate::collaborators::PushResult {
            let knots = crate::hermite::HERMITE_KNOTS;
            let mut out = crate::collaborators::PushResult { r: vec![], phi: vec![], z: vec![], mom1: vec![], mom2: vec![], fate: vec![] };
            for i in range {
                let (r, phi, z, mom1, mom2) = mesh.index_to_position(i).unwrap();
                for _ in 0..knots {
                    out.r.push(r);
                    out.phi.push(phi);
                    out.z.push(z);
                    out.mom1.push(mom1);
                    out.mom2.push(mom2);
                    out.fate.push(0);
                }
            }
            out
        }
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            r: AxisSpec::new(0.0, 1.0, 4),
            phi: AxisSpec::new(0.0, std::f64::consts::TAU, 4),
            z: AxisSpec::new(0.0, 1.0, 4),
            mom1: AxisSpec::new(-1.0, 1.0, 4),
            mom2: AxisSpec::new(0.0, 1.0, 4),
            mass: 1.0,
            charge: 1.0,
            dt: 1e-7,
            sub_cycles: 1,
            seed_mode: SeedModeKind::Uniform,
            n_total: 0,
            n_per_vertex: 1,
            use_hermite: false,
            rng_seed: 1,
        }
    }

    #[test]
    fn rejects_step_before_init_p12() {
        let mut engine = Engine::new(1).unwrap();
        let transport = crate::transport::SingleWorker;
        assert!(matches!(engine.step(&IdentityPush, &transport, &test_config()), Err(Error::InvalidState(_))));
    }

    #[test]
    fn rejects_step_after_finalize_p12() {
        let mut engine = Engine::new(1).unwrap();
        let config = test_config();
        let mode = SeedMode::Uniform { n_per_vertex: config.n_per_vertex };
        engine.init(&config, &mode, &NoWall).unwrap();
        engine.finalize().unwrap();

        let transport = crate::transport::SingleWorker;
        assert!(matches!(engine.step(&IdentityPush, &transport, &config), Err(Error::InvalidState(_))));
    }

    #[test]
    fn full_cycle_init_step_finalize() {
        let mut engine = Engine::new(2).unwrap();
        let config = test_config();
        let mode = SeedMode::Uniform { n_per_vertex: config.n_per_vertex };
        engine.init(&config, &mode, &NoWall).unwrap();
        assert!(!engine.particles().is_empty());

        let transport = crate::transport::SingleWorker;
        engine.step(&IdentityPush, &transport, &config).unwrap();
        assert!(engine.val_prev().is_some());

        engine.finalize().unwrap();
        assert!(engine.val_prev().is_none());
    }

    #[test]
    fn checkpoint_round_trip_through_engine() {
        let mut engine = Engine::new(1).unwrap();
        let config = test_config();
        let mode = SeedMode::Uniform { n_per_vertex: config.n_per_vertex };
        engine.init(&config, &mode, &NoWall).unwrap();

        let mut bytes = Vec::new();
        engine.save_checkpoint(&mut bytes).unwrap();

        let mut restored = Engine::restore_checkpoint(bytes.as_slice(), 1).unwrap();
        assert_eq!(restored.val_prev(), engine.val_prev());

        let fresh_mode = SeedMode::FromInputParticles { n_total: 10, particles: &[InputParticle { r: 0.5, phi: 0.0, z: 0.5 }] };
        restored.reseed(&config, &fresh_mode, &NoWall).unwrap();
        assert_eq!(restored.particles().len(), 10);
    }
}
