// ─────────────────────────────────────────────────────────────────────
// SCPN Accel Core — Linear Algebra
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Fixed-size dense routines for the closed-orbit solvers: 6×6 transfer
//! matrices and the small Gaussian solve over phase-space columns.

use accel_types::error::{TrackError, TrackResult};
use accel_types::pos::Pos;

/// Row-major 6×6 transfer matrix.
pub type Matrix6 = [[f64; 6]; 6];

pub fn identity6() -> Matrix6 {
    let mut m = [[0.0; 6]; 6];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    m
}

pub fn matmul6(a: &Matrix6, b: &Matrix6) -> Matrix6 {
    let mut out = [[0.0; 6]; 6];
    for i in 0..6 {
        for k in 0..6 {
            let aik = a[i][k];
            if aik == 0.0 {
                continue;
            }
            for j in 0..6 {
                out[i][j] += aik * b[k][j];
            }
        }
    }
    out
}

pub fn matvec6(m: &Matrix6, v: &Pos) -> Pos {
    let mut out = Pos::zero();
    for i in 0..6 {
        let mut sum = 0.0;
        for j in 0..6 {
            sum += m[i][j] * v[j];
        }
        out[i] = sum;
    }
    out
}

/// Pivot magnitudes below this are treated as a singular system.
const SINGULAR_PIVOT: f64 = 1e-20;

/// Solve `A·x = b` for `dim` ∈ {4, 6}, where column `j` of `A` is the
/// first `dim` coordinates of `cols[j]`. In-place Gaussian elimination
/// with partial pivoting on the augmented system; unsolved coordinates of
/// the returned `Pos` stay zero.
pub fn solve_posvec(cols: &[Pos], b: &Pos, dim: usize) -> TrackResult<Pos> {
    debug_assert!(dim == 4 || dim == 6);
    debug_assert!(cols.len() >= dim);

    let mut a = [[0.0_f64; 7]; 6];
    for i in 0..dim {
        for (j, col) in cols.iter().take(dim).enumerate() {
            a[i][j] = col[i];
        }
        a[i][dim] = b[i];
    }

    // Forward elimination.
    for k in 0..dim {
        let mut pivot_row = k;
        for r in (k + 1)..dim {
            if a[r][k].abs() > a[pivot_row][k].abs() {
                pivot_row = r;
            }
        }
        if a[pivot_row][k].abs() < SINGULAR_PIVOT {
            return Err(TrackError::LinAlg(format!(
                "singular {dim}x{dim} system, pivot {} at column {k}",
                a[pivot_row][k]
            )));
        }
        a.swap(k, pivot_row);
        for r in (k + 1)..dim {
            let factor = a[r][k] / a[k][k];
            for c in k..=dim {
                a[r][c] -= factor * a[k][c];
            }
        }
    }

    // Back substitution.
    let mut x = Pos::zero();
    for i in (0..dim).rev() {
        let mut sum = a[i][dim];
        for j in (i + 1)..dim {
            sum -= a[i][j] * x[j];
        }
        x[i] = sum / a[i][i];
    }
    Ok(x)
}
