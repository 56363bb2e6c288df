//! Hermite quadrature constants.
//!
//! `HERMITE_KNOTS` and `HERMITE_W` are compile-time constants chosen by the quadrature rule
//! used to approximate the stochastic (collisional) spread of a pushed orbit. They are
//! persisted alongside a [`crate::checkpoint::Checkpoint`] so a reader can verify a saved
//! mesh was produced by a compatible rule before trusting its buffer layout.

/// Number of Hermite knots per mesh element.
pub const HERMITE_KNOTS: usize = 3;

/// Hermite quadrature weights, one per knot. `Σ w_k = 1`.
pub const HERMITE_W: [f64; HERMITE_KNOTS] = [1.0 / 6.0, 2.0 / 3.0, 1.0 / 6.0];

/// Hermite abscissae in units of the momentum-space standard deviation, used by the seeder
/// when `use_hermite` spawns one particle per knot per vertex.
pub const HERMITE_ABSCISSAE: [f64; HERMITE_KNOTS] = [-1.732_050_808, 0.0, 1.732_050_808];

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn weights_sum_to_one() {
        let sum: f64 = HERMITE_W.iter().sum();
        assert_approx_eq!(f64, sum, 1.0, ulps = 4);
    }
}
