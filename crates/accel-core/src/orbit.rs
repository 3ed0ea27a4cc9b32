// ─────────────────────────────────────────────────────────────────────
// SCPN Accel Core — Closed Orbit
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Closed-orbit search and one-turn matrix assembly.
//!
//! # Algorithm
//!
//! Newton iteration on the fixed point of the one-turn map:
//!
//! 1. Track one turn from the guess → residual `r = M(x₀) − x₀`.
//! 2. Perturb each of the d coordinates by `h`, re-track, and build the
//!    finite-difference Jacobian column by column.
//! 3. Solve `(J − I)·Δ = −r` by Gaussian elimination over `Pos` columns
//!    and update `x₀ ← x₀ + Δ`.
//! 4. Stop when `‖r‖_∞ < ε` or after the iteration cap.
//!
//! The 4D variant (RF off) holds `de` and `dl` at the caller-supplied
//! guess values; the 6D variant solves the full phase space and needs a
//! powered cavity to close the longitudinal plane.

use crate::tracking::{element_pass, line_pass};
use accel_math::linalg::{self, Matrix6};
use accel_types::accelerator::Accelerator;
use accel_types::error::{TrackError, TrackResult};
use accel_types::pos::Pos;

// ── Configuration ────────────────────────────────────────────────────

/// Configuration for the Newton fixed-point search.
#[derive(Debug, Clone)]
pub struct OrbitConfig {
    /// Maximum Newton iterations.
    pub max_iterations: usize,
    /// ∞-norm residual tolerance of the fixed point.
    pub tolerance: f64,
    /// Finite-difference step used for the Jacobian columns.
    pub delta: f64,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        OrbitConfig {
            max_iterations: 50,
            tolerance: 1e-12,
            delta: 1e-8,
        }
    }
}

/// One-turn matrix result: the closed orbit at every element entrance,
/// the per-element transfer matrices along it, the one-turn matrix and
/// the affine part `v0 = M(x*) − m66·x*`.
#[derive(Debug, Clone)]
pub struct M66Result {
    pub closed_orbit: Vec<Pos>,
    pub element_matrices: Vec<Matrix6>,
    pub m66: Matrix6,
    pub v0: Pos,
}

fn one_turn(accelerator: &Accelerator, start: &Pos, scratch: &mut Vec<Pos>) -> TrackResult<Pos> {
    let mut pos = *start;
    let mut offset = 0;
    scratch.clear();
    line_pass(accelerator, &mut pos, scratch, &mut offset, false)?;
    Ok(pos)
}

fn newton_fixed_point(
    accelerator: &Accelerator,
    guess: &Pos,
    dim: usize,
    config: &OrbitConfig,
) -> TrackResult<Pos> {
    let mut x0 = *guess;
    let mut scratch = Vec::with_capacity(1);

    for _ in 0..config.max_iterations {
        let mapped = one_turn(accelerator, &x0, &mut scratch)?;
        let residual = mapped - x0;
        if residual.norm_inf(dim) < config.tolerance {
            return Ok(x0);
        }

        // Finite-difference Jacobian of the one-turn map, shifted to J − I.
        let mut cols = [Pos::zero(); 6];
        for (i, col) in cols.iter_mut().take(dim).enumerate() {
            let mut probe = x0;
            probe[i] += config.delta;
            let mapped_probe = one_turn(accelerator, &probe, &mut scratch)?;
            *col = (mapped_probe - mapped) * (1.0 / config.delta);
            (*col)[i] -= 1.0;
        }

        let step = linalg::solve_posvec(&cols[..dim], &(-residual), dim).map_err(|_| {
            TrackError::FindOrbitNotConverged("singular one-turn linear system".into())
        })?;
        for i in 0..dim {
            x0[i] += step[i];
        }
    }

    Err(TrackError::FindOrbitNotConverged(format!(
        "no fixed point within {} iterations",
        config.max_iterations
    )))
}

fn closed_orbit_trajectory(accelerator: &Accelerator, fixed_point: &Pos) -> TrackResult<Vec<Pos>> {
    let mut pos = *fixed_point;
    let mut out = Vec::with_capacity(accelerator.lattice.len() + 1);
    let mut offset = 0;
    line_pass(accelerator, &mut pos, &mut out, &mut offset, true)?;
    Ok(out)
}

/// Transverse (4D) closed orbit with the RF off: `de` and `dl` are held
/// at the values of `fixed_point_guess`. Returns the orbit at every
/// element entrance plus the line exit.
pub fn find_orbit4(
    accelerator: &Accelerator,
    fixed_point_guess: &Pos,
    config: &OrbitConfig,
) -> TrackResult<Vec<Pos>> {
    let fixed_point = newton_fixed_point(accelerator, fixed_point_guess, 4, config)?;
    closed_orbit_trajectory(accelerator, &fixed_point)
}

/// Full 6D closed orbit; requires `cavity_on` for the longitudinal plane
/// to close (without it the Newton system is singular).
pub fn find_orbit6(
    accelerator: &Accelerator,
    fixed_point_guess: &Pos,
    config: &OrbitConfig,
) -> TrackResult<Vec<Pos>> {
    let fixed_point = newton_fixed_point(accelerator, fixed_point_guess, 6, config)?;
    closed_orbit_trajectory(accelerator, &fixed_point)
}

/// Jacobian of a single element map at `entrance`, by one-sided finite
/// differences.
fn element_jacobian(
    accelerator: &Accelerator,
    element_index: usize,
    entrance: &Pos,
    delta: f64,
) -> TrackResult<Matrix6> {
    let element = &accelerator.lattice[element_index];
    let mut reference = *entrance;
    element_pass(accelerator, element, &mut reference)?;

    let mut m = linalg::identity6();
    for j in 0..6 {
        let mut probe = *entrance;
        probe[j] += delta;
        element_pass(accelerator, element, &mut probe)?;
        for (i, row) in m.iter_mut().enumerate() {
            row[j] = (probe[i] - reference[i]) / delta;
        }
    }
    Ok(m)
}

/// 6D closed orbit together with the one-turn matrix (finite-difference
/// Jacobian at the converged orbit) and the per-element transfer
/// matrices, whose ordered product reproduces the one-turn matrix.
pub fn find_m66(
    accelerator: &Accelerator,
    fixed_point_guess: &Pos,
    config: &OrbitConfig,
) -> TrackResult<M66Result> {
    let fixed_point = newton_fixed_point(accelerator, fixed_point_guess, 6, config)?;
    let closed_orbit = closed_orbit_trajectory(accelerator, &fixed_point)?;

    let mut element_matrices = Vec::with_capacity(accelerator.lattice.len());
    for index in 0..accelerator.lattice.len() {
        element_matrices.push(element_jacobian(
            accelerator,
            index,
            &closed_orbit[index],
            config.delta,
        )?);
    }

    let mut scratch = Vec::with_capacity(1);
    let mapped = one_turn(accelerator, &fixed_point, &mut scratch)?;
    let mut m66 = linalg::identity6();
    for j in 0..6 {
        let mut probe = fixed_point;
        probe[j] += config.delta;
        let mapped_probe = one_turn(accelerator, &probe, &mut scratch)?;
        for (i, row) in m66.iter_mut().enumerate() {
            row[j] = (mapped_probe[i] - mapped[i]) / config.delta;
        }
    }
    let v0 = mapped - linalg::matvec6(&m66, &fixed_point);

    Ok(M66Result {
        closed_orbit,
        element_matrices,
        m66,
        v0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use accel_types::element::Element;

    /// Mirror-symmetric thin-lens ring: the lattice reads the same
    /// forwards and backwards from element 0.
    fn symmetric_ring(hkick: f64) -> Accelerator {
        let mut acc = Accelerator::new(3e9, 864);
        acc.lattice.push(Element::corrector("ch", 0.0, hkick, 0.0));
        acc.lattice.push(Element::drift("d1", 1.0));
        acc.lattice.push(Element::thin_quadrupole("qf", 0.5));
        acc.lattice.push(Element::drift("d2", 1.0));
        acc.lattice.push(Element::thin_quadrupole("qd", -0.5));
        acc.lattice.push(Element::drift("d2", 1.0));
        acc.lattice.push(Element::thin_quadrupole("qf", 0.5));
        acc.lattice.push(Element::drift("d1", 1.0));
        acc
    }

    #[test]
    fn test_unperturbed_ring_has_zero_orbit() {
        let acc = symmetric_ring(0.0);
        let orbit = find_orbit4(&acc, &Pos::zero(), &OrbitConfig::default()).unwrap();
        assert_eq!(orbit.len(), acc.lattice.len() + 1);
        for p in &orbit {
            assert!(p.rx.abs() < 1e-12 && p.px.abs() < 1e-12);
        }
    }

    #[test]
    fn test_corrector_orbit_splits_the_kick_symmetrically() {
        let kick = 1e-6;
        let acc = symmetric_ring(kick);
        let orbit = find_orbit4(&acc, &Pos::zero(), &OrbitConfig::default()).unwrap();
        // Entering the corrector the closed orbit carries −kick/2; the
        // kick flips it to +kick/2 on exit.
        assert!(
            (orbit[0].px + 0.5 * kick).abs() < 1e-12,
            "px at corrector entrance = {}",
            orbit[0].px
        );
        assert!((orbit[0].ry).abs() < 1e-12);
    }

    #[test]
    fn test_find_orbit4_holds_longitudinal_coordinates() {
        let acc = symmetric_ring(1e-6);
        let guess = Pos::new(0.0, 0.0, 0.0, 0.0, 1e-4, 0.0);
        let orbit = find_orbit4(&acc, &guess, &OrbitConfig::default()).unwrap();
        assert_eq!(orbit[0].de, 1e-4);
    }

    #[test]
    fn test_orbit_is_a_fixed_point_of_the_turn() {
        let acc = symmetric_ring(1e-6);
        let config = OrbitConfig::default();
        let orbit = find_orbit4(&acc, &Pos::zero(), &config).unwrap();
        let mut scratch = Vec::new();
        let mapped = one_turn(&acc, &orbit[0], &mut scratch).unwrap();
        assert!((mapped - orbit[0]).norm_inf(4) < config.tolerance);
    }

    #[test]
    fn test_exhausted_iteration_cap_reports_not_converged() {
        let acc = symmetric_ring(1e-6);
        let config = OrbitConfig {
            max_iterations: 1,
            ..OrbitConfig::default()
        };
        // One iteration computes the Newton step but never re-checks the
        // residual, so the search must report failure.
        let err = find_orbit4(&acc, &Pos::zero(), &config).unwrap_err();
        assert!(matches!(err, TrackError::FindOrbitNotConverged(_)));
    }
}
