//! Multilinear 5D interpolation of [`Mesh::val_prev`](crate::mesh::Mesh::val_prev).

use crate::convert::usize_from_f64_floor;
use crate::mesh::MeshView;

/// Per-axis vertex index and its interior-boundary check, for one of the four non-periodic
/// axes. Returns `None` unless `0 <= i_a <= n_a - 3`, i.e. unless the axis has at least three
/// abscissae and the query's upper neighbor `i_a + 1` doesn't touch the final cell. This is
/// deliberately asymmetric (the final row is never read) to match the reference
/// implementation's boundary test exactly.
fn axis_index(x: f64, axis: &[f64]) -> Option<usize> {
    let delta = axis[1] - axis[0];
    let raw = (x - axis[0]) / delta;
    let i = usize_from_f64_floor(raw)?;

    let upper = axis.len().checked_sub(3)?;
    (i <= upper).then_some(i)
}

/// Computes the multilinear interpolation of `val_prev` at `(r, phi, z, mom1, mom2)`.
///
/// Returns exactly `0.0` unless every non-periodic axis index lies in its interior range
/// `[0, n_a - 3]`; no clamping or extrapolation occurs. `phi` is periodic and is wrapped to
/// the mesh's covered interval before lookup, matching the contract that orbit-push output is
/// already periodic but letting this function be queried directly (as the test suite does)
/// without requiring the caller to pre-wrap.
#[must_use]
pub fn interpolate(mesh: MeshView<'_>, r: f64, phi: f64, z: f64, mom1: f64, mom2: f64) -> f64 {
    let Some(i_r) = axis_index(r, mesh.r()) else {
        return 0.0;
    };
    let Some(i_z) = axis_index(z, mesh.z()) else {
        return 0.0;
    };
    let Some(i_mom1) = axis_index(mom1, mesh.mom1()) else {
        return 0.0;
    };
    let Some(i_mom2) = axis_index(mom2, mesh.mom2()) else {
        return 0.0;
    };

    let n_phi = mesh.phi().len();
    let (i_phi, i_phi1, d_phi, phi_vol) = if n_phi == 1 {
        (0, 0, (0.5, 0.5), 1.0_f64)
    } else {
        let period = mesh.phi_period();
        let phi0 = mesh.phi()[0];
        let delta = mesh.phi()[1] - phi0;
        let wrapped = phi0 + (phi - phi0).rem_euclid(period);

        let i_phi = (((wrapped - phi0) / delta).floor() as usize).min(n_phi - 1);
        let i_phi1 = if i_phi == n_phi - 1 { 0 } else { i_phi + 1 };

        let phi_i = mesh.phi()[i_phi];
        let phi_i1 = if i_phi1 == 0 { phi0 + period } else { mesh.phi()[i_phi1] };

        let d_phi = (phi_i1 - wrapped, wrapped - phi_i);
        let vol = (phi_i1 - phi_i).abs().max(1.0);

        (i_phi, i_phi1, d_phi, vol)
    };

    let r_axis = mesh.r();
    let z_axis = mesh.z();
    let mom1_axis = mesh.mom1();
    let mom2_axis = mesh.mom2();

    let d_r = (r_axis[i_r + 1] - r, r - r_axis[i_r]);
    let d_z = (z_axis[i_z + 1] - z, z - z_axis[i_z]);
    let d_mom1 = (mom1_axis[i_mom1 + 1] - mom1, mom1 - mom1_axis[i_mom1]);
    let d_mom2 = (mom2_axis[i_mom2 + 1] - mom2, mom2 - mom2_axis[i_mom2]);

    let volume = (r_axis[i_r + 1] - r_axis[i_r])
        * phi_vol
        * (z_axis[i_z + 1] - z_axis[i_z])
        * (mom1_axis[i_mom1 + 1] - mom1_axis[i_mom1])
        * (mom2_axis[i_mom2 + 1] - mom2_axis[i_mom2]);

    let mut acc = 0.0;
    for (c_r, w_r) in [(0, d_r.0), (1, d_r.1)] {
        for (c_z, w_z) in [(0, d_z.0), (1, d_z.1)] {
            for (c_phi, w_phi) in [(i_phi, d_phi.0), (i_phi1, d_phi.1)] {
                for (c_mom1, w_mom1) in [(0, d_mom1.0), (1, d_mom1.1)] {
                    for (c_mom2, w_mom2) in [(0, d_mom2.0), (1, d_mom2.1)] {
                        let idx = mesh.linear_index(i_r + c_r, c_phi, i_z + c_z, i_mom1 + c_mom1, i_mom2 + c_mom2);
                        acc += mesh.val_prev()[idx] * w_r * w_z * w_phi * w_mom1 * w_mom2;
                    }
                }
            }
        }
    }

    acc / volume
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{AxisSpec, Mesh};
    use float_cmp::assert_approx_eq;

    fn axis(min: f64, max: f64, n: usize) -> AxisSpec {
        AxisSpec::new(min, max, n)
    }

    #[test]
    fn boundary_policy_scenario_one_p4() {
        // mesh 2x2x1x2x2 (scenario 1): interior indices never reach i_a <= n_a-3 when n_a==2
        let mut mesh = Mesh::new(
            axis(0.0, 1.0, 1),
            axis(0.0, std::f64::consts::TAU, 1),
            axis(0.0, 1.0, 1),
            axis(-1.0, 1.0, 1),
            axis(0.0, 1.0, 1),
        )
        .unwrap();
        mesh.val_prev[0] = 1.0;

        assert_approx_eq!(f64, interpolate(mesh.view(), 0.0, 0.0, 0.0, -1.0, 0.0), 0.0, ulps = 4);
    }

    #[test]
    fn interior_vertex_is_one_p3() {
        // widen to count=3 per axis so an interior vertex actually exists
        let mut mesh = Mesh::new(
            axis(0.0, 1.0, 3),
            axis(0.0, std::f64::consts::TAU, 3),
            axis(0.0, 1.0, 3),
            axis(-1.0, 1.0, 3),
            axis(0.0, 1.0, 3),
        )
        .unwrap();

        let idx = mesh.linear_index(1, 1, 1, 1, 1);
        mesh.val_prev[idx] = 1.0;

        let (r, phi, z, mom1, mom2) = mesh.index_to_position(idx).unwrap();
        assert_approx_eq!(f64, interpolate(mesh.view(), r, phi, z, mom1, mom2), 1.0, ulps = 4);
    }

    #[test]
    fn partition_of_unity_p5() {
        let mesh_const = {
            let mut mesh = Mesh::new(
                axis(0.0, 1.0, 4),
                axis(0.0, std::f64::consts::TAU, 4),
                axis(0.0, 1.0, 4),
                axis(-1.0, 1.0, 4),
                axis(0.0, 1.0, 4),
            )
            .unwrap();
            mesh.val_prev.iter_mut().for_each(|v| *v = 0.7);
            mesh
        };

        let got = interpolate(mesh_const.view(), 0.37, 1.1, 0.52, 0.1, 0.6);
        assert_approx_eq!(f64, got, 0.7, ulps = 8);
    }

    #[test]
    fn periodic_wrap_p6() {
        let n_phi = 4;
        let mut mesh = Mesh::new(
            axis(0.0, 1.0, 4),
            axis(0.0, std::f64::consts::TAU, n_phi),
            axis(0.0, 1.0, 4),
            axis(-1.0, 1.0, 4),
            axis(0.0, 1.0, 4),
        )
        .unwrap();

        // a field that is itself phi-periodic by construction (sampled from a function of
        // the continuous phi coordinate, not of the vertex index)
        for idx in 0..mesh.size() {
            let (r, phi, z, mom1, mom2) = mesh.index_to_position(idx).unwrap();
            mesh.val_prev[idx] = r.mul_add(0.3, z * 0.2) + phi.cos() + mom1 * 0.1 + mom2 * 0.05;
        }

        let period = std::f64::consts::TAU;
        let a = interpolate(mesh.view(), 0.3, 1.1, 0.3, 0.1, 0.4);
        let b = interpolate(mesh.view(), 0.3, 1.1 + period, 0.3, 0.1, 0.4);

        assert_approx_eq!(f64, a, b, ulps = 4);
    }
}
