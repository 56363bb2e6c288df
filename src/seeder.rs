//! C5: the importance-sampling seeder — generates the initial pseudo-particle population
//! (§4.5).
//!
//! Binning happens over mesh *cells*; placement happens either at cell vertices (Hermite
//! expansion in momentum) or at uniform random points drawn from a per-cell, seed-derived
//! PRNG, so that the output distribution does not depend on the order cells happen to be
//! visited in.

use crate::collaborators::{MagneticField, PlasmaBackground, Wall2D};
use crate::convert::{f64_from_usize, usize_from_f64_round};
use crate::hermite::{HERMITE_ABSCISSAE, HERMITE_KNOTS};
use crate::mesh::Mesh;
use crate::particle::{InputParticle, PseudoParticle};
use rand::Rng;
use rand_pcg::Pcg64;
use std::collections::HashMap;

/// A fixed stream constant for the per-cell PRNG, chosen arbitrarily; only `rng_seed` (mixed
/// per cell below) needs to vary for reproducibility.
const PCG_STREAM: u128 = 0xa02bdbf7bb3c0a7ac28fa16a64abf96;

/// One of the four importance-sampling modes (§4.5), each carrying the data or collaborator
/// it needs. A tagged variant, not subtype polymorphism (§9): there is no dynamic dispatch
/// across modes, only a `match` in [`seed`].
pub enum SeedMode<'a> {
    /// `h_c = 1` for every in-wall cell; `n_per_vertex` particles are placed directly at each
    /// in-wall vertex, bypassing the `n_total`/histogram allocation entirely.
    Uniform {
        /// Particles placed at every in-wall vertex.
        n_per_vertex: usize,
    },
    /// `h_c` = a user-supplied probability field sampled at the cell centroid.
    UserProbability {
        /// Total particle budget, allocated across cells proportionally to the histogram.
        n_total: usize,
        /// `probability(r, phi, z, mom1, mom2) -> h_c`.
        probability: &'a dyn Fn(f64, f64, f64, f64, f64) -> f64,
    },
    /// `h_c` = summed species densities at the cell centroid's flux coordinate.
    PlasmaDensity {
        /// Total particle budget, allocated across cells proportionally to the histogram.
        n_total: usize,
        /// Flux-coordinate evaluator.
        field: &'a dyn MagneticField,
        /// Species-density background.
        plasma: &'a dyn PlasmaBackground,
    },
    /// `h_c` = count of externally supplied particles whose `(R, z, phi)` falls in cell `c`.
    FromInputParticles {
        /// Total particle budget, allocated across cells proportionally to the histogram.
        n_total: usize,
        /// The externally supplied particles driving the histogram.
        particles: &'a [InputParticle],
    },
}

/// Produces the seeded pseudo-particle population for `mesh` under `mode`.
///
/// Cells outside `wall`'s contour receive no particles. `use_hermite` selects between
/// placing particles at cell vertices (one Hermite knot group of [`HERMITE_KNOTS`] particles
/// per vertex, momentum-offset by [`HERMITE_ABSCISSAE`]) or at uniform random points in the
/// cell's interior. `rng_seed` drives a per-cell [`Pcg64`] stream so the output distribution
/// is reproducible independently of the order cells are visited in (§4.5 determinism).
#[must_use]
pub fn seed(mesh: &Mesh, mode: &SeedMode<'_>, wall: &dyn Wall2D, mass: f64, charge: f64, t0: f64, use_hermite: bool, rng_seed: u64) -> Vec<PseudoParticle> {
    if let SeedMode::Uniform { n_per_vertex } = mode {
        return seed_uniform(mesh, wall, mass, charge, t0, *n_per_vertex, use_hermite);
    }

    let n_total = match mode {
        SeedMode::Uniform { .. } => unreachable!("handled above"),
        SeedMode::UserProbability { n_total, .. } | SeedMode::PlasmaDensity { n_total, .. } | SeedMode::FromInputParticles { n_total, .. } => *n_total,
    };

    let allocation = histogram_allocation(mesh, mode, wall, n_total);

    let mut next_id: u64 = 0;
    let mut particles = Vec::with_capacity(n_total);
    let (nr, nphi, nz, nm1, nm2) = mesh.cell_counts();

    for i_mom2 in 0..nm2 {
        for i_mom1 in 0..nm1 {
            for i_phi in 0..nphi {
                for i_z in 0..nz {
                    for i_r in 0..nr {
                        let cell = mesh.linear_cell_index(i_r, i_phi, i_z, i_mom1, i_mom2);
                        let n_c = allocation[cell];
                        if n_c == 0 {
                            continue;
                        }

                        if use_hermite {
                            place_hermite(mesh, i_r, i_phi, i_z, i_mom1, i_mom2, n_c, mass, charge, t0, &mut next_id, &mut particles);
                        } else {
                            place_uniform_random(mesh, i_r, i_phi, i_z, i_mom1, i_mom2, n_c, mass, charge, t0, rng_seed, cell, &mut next_id, &mut particles);
                        }
                    }
                }
            }
        }
    }

    particles
}

/// Builds the per-cell histogram for the three importance-sampling modes, normalizes it to
/// probabilities, and apportions `n_total` across cells (§4.5: `n_c = round(n_total * p_c)`,
/// independently per cell, so the realized total may differ from `n_total` by up to `n_cells`
/// through accumulated rounding — see [`apportion`]).
fn histogram_allocation(mesh: &Mesh, mode: &SeedMode<'_>, wall: &dyn Wall2D, n_total: usize) -> Vec<usize> {
    let n_cells = mesh.n_cells();
    let (nr, nphi, nz, nm1, nm2) = mesh.cell_counts();
    let mut hist = vec![0.0_f64; n_cells];

    let spatial_counts = if let SeedMode::FromInputParticles { particles, .. } = mode {
        Some(count_input_particles_by_spatial_cell(mesh, particles))
    } else {
        None
    };

    for i_mom2 in 0..nm2 {
        for i_mom1 in 0..nm1 {
            for i_phi in 0..nphi {
                for i_z in 0..nz {
                    for i_r in 0..nr {
                        let (cr, cphi, cz, cm1, cm2) = mesh.cell_centroid(i_r, i_phi, i_z, i_mom1, i_mom2);
                        if !wall.contains(cr, cz) {
                            continue;
                        }

                        let cell = mesh.linear_cell_index(i_r, i_phi, i_z, i_mom1, i_mom2);
                        hist[cell] = match mode {
                            SeedMode::Uniform { .. } => unreachable!("handled by seed_uniform"),
                            SeedMode::UserProbability { probability, .. } => probability(cr, cphi, cz, cm1, cm2),
                            SeedMode::PlasmaDensity { field, plasma, .. } => {
                                let rho_pol = field.rho_pol(cr, cz);
                                plasma.densities(rho_pol).iter().sum()
                            }
                            SeedMode::FromInputParticles { .. } => {
                                let count = spatial_counts
                                    .as_ref()
                                    .expect("spatial_counts is Some whenever mode is FromInputParticles")
                                    .get(&(i_r, i_phi, i_z))
                                    .copied()
                                    .unwrap_or(0);
                                f64_from_usize(count) / f64_from_usize(nm1 * nm2)
                            }
                        };
                    }
                }
            }
        }
    }

    apportion(&hist, n_total)
}

/// Counts externally supplied particles per spatial `(i_r, i_phi, i_z)` cell, ignoring the
/// momentum axes (the `FromInputParticles` histogram is defined purely over `(R, z, phi)`
/// per §4.5; its count is then spread evenly across that spatial cell's momentum sub-cells).
fn count_input_particles_by_spatial_cell(mesh: &Mesh, particles: &[InputParticle]) -> HashMap<(usize, usize, usize), usize> {
    let mut counts = HashMap::new();
    for p in particles {
        let (i_r, i_phi, i_z, _, _) = mesh.cell_of(p.r, p.phi, p.z, 0.0, 0.0);
        *counts.entry((i_r, i_phi, i_z)).or_insert(0) += 1;
    }
    counts
}

/// Apportions `n_total` across `hist`'s normalized weights: `n_c = round(n_total * p_c)`
/// (§4.5), independently per cell. The sum may therefore differ from `n_total` by up to
/// `n_cells` particles through accumulated rounding, which is the slack P10 allows for.
fn apportion(hist: &[f64], n_total: usize) -> Vec<usize> {
    let total: f64 = hist.iter().sum();
    if total <= 0.0 || n_total == 0 {
        return vec![0; hist.len()];
    }

    hist.iter().map(|&h| usize_from_f64_round(f64_from_usize(n_total) * h / total)).collect()
}

/// Spawns a Hermite knot group (momentum offset by [`HERMITE_ABSCISSAE`], scaled by a
/// quarter of the local momentum cell width) at each of cell `(i_r, i_phi, i_z, i_mom1,
/// i_mom2)`'s 32 corner vertices in turn, cycling through corners until `remaining`
/// particles have been emitted (the last group truncated if `remaining` is not a multiple of
/// [`HERMITE_KNOTS`]).
#[allow(clippy::too_many_arguments)]
fn place_hermite(mesh: &Mesh, i_r: usize, i_phi: usize, i_z: usize, i_mom1: usize, i_mom2: usize, n_c: usize, mass: f64, charge: f64, t0: f64, next_id: &mut u64, out: &mut Vec<PseudoParticle>) {
    let corners = corner_vertices(mesh, i_r, i_phi, i_z, i_mom1, i_mom2);
    let mom1_step = mesh.mom1()[i_mom1 + 1] - mesh.mom1()[i_mom1];
    let mom2_step = mesh.mom2()[i_mom2 + 1] - mesh.mom2()[i_mom2];

    let mut remaining = n_c;
    let mut corner_idx = 0;
    while remaining > 0 {
        let vertex = corners[corner_idx % corners.len()];
        corner_idx += 1;

        let (vr, vphi, vz, vm1, vm2) = mesh.index_to_position(vertex).expect("corner index is always in range");
        let take = remaining.min(HERMITE_KNOTS);
        for &sigma in &HERMITE_ABSCISSAE[..take] {
            out.push(PseudoParticle {
                id: *next_id,
                r: vr,
                phi: vphi,
                z: vz,
                mom1: sigma.mul_add(mom1_step * 0.25, vm1),
                mom2: sigma.mul_add(mom2_step * 0.25, vm2),
                mass,
                charge,
                t: t0,
                origin: vertex,
            });
            *next_id += 1;
        }
        remaining -= take;
    }
}

/// Draws `n_c` particles uniformly at random from the continuous interior of cell `(i_r,
/// i_phi, i_z, i_mom1, i_mom2)`, using a PRNG seeded from `rng_seed` mixed with the cell's
/// flat index so the draws for one cell never depend on the order other cells are visited
/// in. Each particle's `origin` is the cell's lower corner vertex.
#[allow(clippy::too_many_arguments)]
fn place_uniform_random(mesh: &Mesh, i_r: usize, i_phi: usize, i_z: usize, i_mom1: usize, i_mom2: usize, n_c: usize, mass: f64, charge: f64, t0: f64, rng_seed: u64, cell: usize, next_id: &mut u64, out: &mut Vec<PseudoParticle>) {
    let origin = mesh.linear_index(i_r, i_phi, i_z, i_mom1, i_mom2);
    let mut rng = Pcg64::new(u128::from(rng_seed) ^ u128::from(cell as u64), PCG_STREAM);

    let r_range = mesh.r()[i_r]..mesh.r()[i_r + 1];
    let z_range = mesh.z()[i_z]..mesh.z()[i_z + 1];
    let mom1_range = mesh.mom1()[i_mom1]..mesh.mom1()[i_mom1 + 1];
    let mom2_range = mesh.mom2()[i_mom2]..mesh.mom2()[i_mom2 + 1];
    let phi_lo = mesh.phi()[i_phi];
    let phi_hi = if i_phi + 1 < mesh.n_phi() { mesh.phi()[i_phi + 1] } else { mesh.phi()[0] + mesh.phi_period() };

    for _ in 0..n_c {
        out.push(PseudoParticle {
            id: *next_id,
            r: rng.random_range(r_range.clone()),
            phi: rng.random_range(phi_lo..phi_hi),
            z: rng.random_range(z_range.clone()),
            mom1: rng.random_range(mom1_range.clone()),
            mom2: rng.random_range(mom2_range.clone()),
            mass,
            charge,
            t: t0,
            origin,
        });
        *next_id += 1;
    }
}

/// The 32 vertex indices forming the corners of cell `(i_r, i_phi, i_z, i_mom1, i_mom2)`, in
/// the same `(c_r, c_z, c_phi, c_mom1, c_mom2)` enumeration order as the interpolator's
/// hypercube sum.
fn corner_vertices(mesh: &Mesh, i_r: usize, i_phi: usize, i_z: usize, i_mom1: usize, i_mom2: usize) -> [usize; 32] {
    let n_phi = mesh.n_phi();
    let mut out = [0usize; 32];
    let mut idx = 0;
    for c_mom2 in 0..=1 {
        for c_mom1 in 0..=1 {
            for c_phi in 0..=1 {
                let phi_idx = if c_phi == 0 { i_phi } else { (i_phi + 1) % n_phi };
                for c_z in 0..=1 {
                    for c_r in 0..=1 {
                        out[idx] = mesh.linear_index(i_r + c_r, phi_idx, i_z + c_z, i_mom1 + c_mom1, i_mom2 + c_mom2);
                        idx += 1;
                    }
                }
            }
        }
    }
    out
}

/// `Uniform` mode: `n_per_vertex` particles placed exactly at each in-wall vertex's
/// coordinates (no importance weighting, no `n_total` allocation, no randomization — every
/// one of the `n_per_vertex` copies sits at the same point unless `use_hermite` spreads them
/// out in momentum).
fn seed_uniform(mesh: &Mesh, wall: &dyn Wall2D, mass: f64, charge: f64, t0: f64, n_per_vertex: usize, use_hermite: bool) -> Vec<PseudoParticle> {
    let mut next_id: u64 = 0;
    let mut particles = Vec::new();

    for idx in 0..mesh.size() {
        let (r, phi, z, mom1, mom2) = mesh.index_to_position(idx).expect("idx < mesh.size()");
        if !wall.contains(r, z) {
            continue;
        }

        if use_hermite {
            let (_, _, _, i_mom1, i_mom2) = mesh.cell_of(r, phi, z, mom1, mom2);
            let mom1_step = mesh.mom1()[i_mom1 + 1] - mesh.mom1()[i_mom1];
            let mom2_step = mesh.mom2()[i_mom2 + 1] - mesh.mom2()[i_mom2];

            let mut remaining = n_per_vertex;
            while remaining > 0 {
                let take = remaining.min(HERMITE_KNOTS);
                for &sigma in &HERMITE_ABSCISSAE[..take] {
                    particles.push(PseudoParticle {
                        id: next_id,
                        r,
                        phi,
                        z,
                        mom1: sigma.mul_add(mom1_step * 0.25, mom1),
                        mom2: sigma.mul_add(mom2_step * 0.25, mom2),
                        mass,
                        charge,
                        t: t0,
                        origin: idx,
                    });
                    next_id += 1;
                }
                remaining -= take;
            }
        } else {
            for _ in 0..n_per_vertex {
                particles.push(PseudoParticle { id: next_id, r, phi, z, mom1, mom2, mass, charge, t: t0, origin: idx });
                next_id += 1;
            }
        }
    }

    particles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::AxisSpec;

    struct AllWall;
    impl Wall2D for AllWall {
        fn contains(&self, _r: f64, _z: f64) -> bool {
            true
        }
    }

    struct ColumnDensity;
    impl MagneticField for ColumnDensity {
        fn rho_pol(&self, r: f64, _z: f64) -> f64 {
            r
        }
    }
    impl PlasmaBackground for ColumnDensity {
        fn densities(&self, rho_pol: f64) -> Vec<f64> {
            vec![rho_pol]
        }
    }

    fn spatial_mesh() -> Mesh {
        Mesh::new(
            AxisSpec::new(0.0, 10.0, 10),
            AxisSpec::new(0.0, std::f64::consts::TAU, 1),
            AxisSpec::new(0.0, 10.0, 10),
            AxisSpec::new(0.0, 1.0, 1),
            AxisSpec::new(0.0, 1.0, 1),
        )
        .unwrap()
    }

    #[test]
    fn uniform_mode_seeds_every_vertex_p10() {
        let mesh = spatial_mesh();
        let mode = SeedMode::Uniform { n_per_vertex: 2 };
        let particles = seed(&mesh, &mode, &AllWall, 1.0, 1.0, 0.0, false, 42);

        assert_eq!(particles.len(), mesh.size() * 2);
        for p in &particles {
            assert!(p.origin < mesh.size());
        }
    }

    #[test]
    fn importance_seeding_mass_conservation_scenario_six() {
        let mesh = spatial_mesh();
        let n_total = 10_000;
        let mode = SeedMode::PlasmaDensity { n_total, field: &ColumnDensity, plasma: &ColumnDensity };
        let particles = seed(&mesh, &mode, &AllWall, 1.0, 1.0, 0.0, false, 7);

        // P10: independent per-cell rounding may miss n_total by up to n_cells.
        let slack = mesh.n_cells();
        assert!(particles.len().abs_diff(n_total) <= slack);

        // density h_c = R_c, so larger-R columns should receive proportionally more
        // particles than smaller-R columns.
        let low_r_column = particles.iter().filter(|p| p.r < 2.0).count();
        let high_r_column = particles.iter().filter(|p| p.r >= 8.0).count();
        assert!(high_r_column > low_r_column);
    }

    #[test]
    fn input_particle_mode_respects_spatial_bins() {
        let mesh = spatial_mesh();
        let input = vec![InputParticle { r: 9.5, phi: 0.0, z: 9.5 }; 50];
        let n_total = 1000;
        let mode = SeedMode::FromInputParticles { n_total, particles: &input };
        let particles = seed(&mesh, &mode, &AllWall, 1.0, 1.0, 0.0, false, 3);

        let slack = mesh.n_cells();
        assert!(particles.len().abs_diff(n_total) <= slack);
        assert!(particles.iter().all(|p| p.r >= 9.0 && p.z >= 9.0));
    }

    #[test]
    fn deterministic_for_a_given_seed() {
        let mesh = spatial_mesh();
        let n_total = 500;
        let mode_a = SeedMode::PlasmaDensity { n_total, field: &ColumnDensity, plasma: &ColumnDensity };
        let mode_b = SeedMode::PlasmaDensity { n_total, field: &ColumnDensity, plasma: &ColumnDensity };

        let a = seed(&mesh, &mode_a, &AllWall, 1.0, 1.0, 0.0, false, 99);
        let b = seed(&mesh, &mode_b, &AllWall, 1.0, 1.0, 0.0, false, 99);

        assert_eq!(a.len(), b.len());
        for (pa, pb) in a.iter().zip(b.iter()) {
            assert!((pa.r - pb.r).abs() < 1e-12 && (pa.z - pb.z).abs() < 1e-12);
        }
    }
}
