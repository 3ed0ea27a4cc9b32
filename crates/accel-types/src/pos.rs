// ─────────────────────────────────────────────────────────────────────
// SCPN Accel Core — Phase Space
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Six-dimensional phase-space coordinate of a tracked particle.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Index, IndexMut, Mul, Neg, Sub, SubAssign};

/// Phase-space coordinate relative to the reference particle:
/// horizontal position/angle, vertical position/angle, relative energy
/// deviation δ = ΔE/E₀ and path-length deviation.
///
/// Coordinate indices follow the canonical ordering
/// `0:rx 1:px 2:ry 3:py 4:de 5:dl`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pos {
    pub rx: f64, // [m]
    pub px: f64, // [rad]
    pub ry: f64, // [m]
    pub py: f64, // [rad]
    pub de: f64,
    pub dl: f64, // [m]
}

impl Pos {
    /// Number of phase-space coordinates.
    pub const DIM: usize = 6;

    pub fn new(rx: f64, px: f64, ry: f64, py: f64, de: f64, dl: f64) -> Self {
        Pos {
            rx,
            px,
            ry,
            py,
            de,
            dl,
        }
    }

    pub fn zero() -> Self {
        Pos::default()
    }

    /// Loss sentinel: every coordinate NaN.
    pub fn nan() -> Self {
        Pos::new(
            f64::NAN,
            f64::NAN,
            f64::NAN,
            f64::NAN,
            f64::NAN,
            f64::NAN,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.rx.is_finite()
            && self.px.is_finite()
            && self.ry.is_finite()
            && self.py.is_finite()
            && self.de.is_finite()
            && self.dl.is_finite()
    }

    /// ∞-norm over the first `dim` coordinates (4 or 6), as used by the
    /// closed-orbit residual test.
    pub fn norm_inf(&self, dim: usize) -> f64 {
        (0..dim).fold(0.0_f64, |acc, i| acc.max(self[i].abs()))
    }
}

impl Index<usize> for Pos {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        match index {
            0 => &self.rx,
            1 => &self.px,
            2 => &self.ry,
            3 => &self.py,
            4 => &self.de,
            5 => &self.dl,
            _ => panic!("phase-space coordinate index out of range: {index}"),
        }
    }
}

impl IndexMut<usize> for Pos {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        match index {
            0 => &mut self.rx,
            1 => &mut self.px,
            2 => &mut self.ry,
            3 => &mut self.py,
            4 => &mut self.de,
            5 => &mut self.dl,
            _ => panic!("phase-space coordinate index out of range: {index}"),
        }
    }
}

impl Add for Pos {
    type Output = Pos;

    fn add(self, o: Pos) -> Pos {
        Pos::new(
            self.rx + o.rx,
            self.px + o.px,
            self.ry + o.ry,
            self.py + o.py,
            self.de + o.de,
            self.dl + o.dl,
        )
    }
}

impl Sub for Pos {
    type Output = Pos;

    fn sub(self, o: Pos) -> Pos {
        Pos::new(
            self.rx - o.rx,
            self.px - o.px,
            self.ry - o.ry,
            self.py - o.py,
            self.de - o.de,
            self.dl - o.dl,
        )
    }
}

impl Mul<f64> for Pos {
    type Output = Pos;

    fn mul(self, s: f64) -> Pos {
        Pos::new(
            self.rx * s,
            self.px * s,
            self.ry * s,
            self.py * s,
            self.de * s,
            self.dl * s,
        )
    }
}

impl Neg for Pos {
    type Output = Pos;

    fn neg(self) -> Pos {
        self * -1.0
    }
}

impl AddAssign for Pos {
    fn add_assign(&mut self, o: Pos) {
        *self = *self + o;
    }
}

impl SubAssign for Pos {
    fn sub_assign(&mut self, o: Pos) {
        *self = *self - o;
    }
}
