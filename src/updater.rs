//! C3: consumes per-knot endpoint arrays from the orbit-push oracle and accumulates
//! Hermite-weighted contributions into `val_next` (§4.3).

use crate::collaborators::PushResult;
use crate::hermite::HERMITE_W;
use crate::interpolation::interpolate;
use crate::mesh::MeshView;
use crate::particle::Fate;
use itertools::izip;
use rayon::prelude::*;

/// Updates `val_next[start..stop]` from `push`, the orbit-push output for that range.
///
/// `push` must hold exactly `(stop - start) * HERMITE_KNOTS` endpoint records, laid out knot-
/// major within each mesh element as in §3.3: record `(i, k)` at offset `(i - start) *
/// HERMITE_KNOTS + k`. Every element of `val_next` is untouched outside `[start, stop)`; the
/// accumulation across `i` is data-parallel (the iteration here runs on the caller's
/// [`rayon::ThreadPool`]), the `k` loop within one `i` is sequential on a single accumulator,
/// matching the source's index-partitioned write discipline (§9).
///
/// # Panics
///
/// Panics if `push`'s arrays are not exactly `(stop - start) * HERMITE_KNOTS` long, or if
/// `val_next.len() < stop`.
pub fn update(view: MeshView<'_>, val_next: &mut [f64], start: usize, stop: usize, push: &PushResult) {
    let knots = crate::hermite::HERMITE_KNOTS;
    let count = stop - start;
    assert_eq!(push.r.len(), count * knots, "endpoint array length must be (stop - start) * HERMITE_KNOTS");
    assert_eq!(push.fate.len(), count * knots);

    val_next[start..stop].par_iter_mut().enumerate().for_each(|(offset, acc)| {
        let base = offset * knots;
        let knot_range = base..base + knots;

        let mut sum = 0.0;
        for (k, (&r, &phi, &z, &mom1, &mom2, &fate_code)) in izip!(
            &push.r[knot_range.clone()],
            &push.phi[knot_range.clone()],
            &push.z[knot_range.clone()],
            &push.mom1[knot_range.clone()],
            &push.mom2[knot_range.clone()],
            &push.fate[knot_range]
        )
        .enumerate()
        {
            let fate = Fate::from_code(fate_code).expect("orbit push produced an unrecognized fate code");
            let v_k = match fate {
                Fate::Fild => 1.0,
                Fate::Error | Fate::Wall => 0.0,
                Fate::InFlight => interpolate(view, r, phi, z, mom1, mom2),
            };
            sum += HERMITE_W[k] * v_k;
        }

        *acc += sum;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{AxisSpec, Mesh};
    use float_cmp::assert_approx_eq;

    fn test_mesh() -> Mesh {
        Mesh::new(
            AxisSpec::new(0.0, 1.0, 8),
            AxisSpec::new(0.0, std::f64::consts::TAU, 4),
            AxisSpec::new(0.0, 1.0, 8),
            AxisSpec::new(-1.0, 1.0, 8),
            AxisSpec::new(0.0, 1.0, 8),
        )
        .unwrap()
    }

    fn identity_push(mesh: &Mesh, start: usize, stop: usize) -> PushResult {
        let knots = crate::hermite::HERMITE_KNOTS;
        let mut r = Vec::new();
        let mut phi = Vec::new();
        let mut z = Vec::new();
        let mut mom1 = Vec::new();
        let mut mom2 = Vec::new();
        let mut fate = Vec::new();

        for i in start..stop {
            let (pr, pphi, pz, pm1, pm2) = mesh.index_to_position(i).unwrap();
            for _ in 0..knots {
                r.push(pr);
                phi.push(pphi);
                z.push(pz);
                mom1.push(pm1);
                mom2.push(pm2);
                fate.push(0);
            }
        }

        PushResult { r, phi, z, mom1, mom2, fate }
    }

    #[test]
    fn identity_step_with_constant_field_scenario_two() {
        let mut mesh = test_mesh();
        mesh.val_prev.iter_mut().for_each(|v| *v = 0.7);
        let size = mesh.size();
        let push = identity_push(&mesh, 0, size);

        let (view, val_next) = mesh.split_for_update();
        update(view, val_next, 0, size, &push);

        // Only vertices whose every non-periodic axis index lies in the interior `[0, n-3]`
        // are reproduced exactly; a vertex known to satisfy that on every axis is checked here.
        let idx = mesh.linear_index(1, 0, 1, 1, 1);
        assert_approx_eq!(f64, mesh.val_next()[idx], 0.7, ulps = 8);
    }

    #[test]
    fn all_fild_hits_scenario_three() {
        let mut mesh = test_mesh();
        let size = mesh.size();
        let mut push = identity_push(&mesh, 0, size);
        push.fate.iter_mut().for_each(|f| *f = 2);

        let (view, val_next) = mesh.split_for_update();
        update(view, val_next, 0, size, &push);

        assert!(mesh.val_next().iter().all(|&v| (v - 1.0).abs() < 1e-9));
    }

    #[test]
    fn all_wall_hits_scenario_four() {
        let mut mesh = test_mesh();
        let size = mesh.size();
        let mut push = identity_push(&mesh, 0, size);
        push.fate.iter_mut().for_each(|f| *f = 1);

        let (view, val_next) = mesh.split_for_update();
        update(view, val_next, 0, size, &push);

        assert!(mesh.val_next().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn mixed_fates_combine_linearly_p8() {
        let mut mesh = test_mesh();
        let idx = mesh.linear_index(1, 0, 1, 1, 1);
        let knots = crate::hermite::HERMITE_KNOTS;

        let (pr, pphi, pz, pm1, pm2) = mesh.index_to_position(idx).unwrap();
        let push = PushResult {
            r: vec![pr; knots],
            phi: vec![pphi; knots],
            z: vec![pz; knots],
            mom1: vec![pm1; knots],
            mom2: vec![pm2; knots],
            fate: vec![2, 1, 0],
        };

        let (view, val_next) = mesh.split_for_update();
        update(view, val_next, idx, idx + 1, &push);

        // knot 0 (FILD) contributes w0 * 1.0, knot 1 (wall) contributes 0, knot 2 (in-flight,
        // val_prev all zero) contributes 0.
        assert_approx_eq!(f64, mesh.val_next()[idx], HERMITE_W[0], ulps = 8);
    }
}
