// ─────────────────────────────────────────────────────────────────────
// SCPN Accel Core — Elements
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Lattice element record and the closed set of tracking maps.

use crate::kicktable::Kicktable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Closed set of single-element maps. The wire names are the literal
/// `pass_method` strings of the flat-file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassMethod {
    #[serde(rename = "identity_pass")]
    IdentityPass,
    #[serde(rename = "drift_pass")]
    DriftPass,
    #[serde(rename = "str_mpole_symplectic4_pass")]
    StrMpoleSymplectic4Pass,
    #[serde(rename = "bnd_mpole_symplectic4_pass")]
    BndMpoleSymplectic4Pass,
    #[serde(rename = "corrector_pass")]
    CorrectorPass,
    #[serde(rename = "cavity_pass")]
    CavityPass,
    #[serde(rename = "thinquad_pass")]
    ThinQuadPass,
    #[serde(rename = "thinsext_pass")]
    ThinSextPass,
    #[serde(rename = "kicktable_pass")]
    KicktablePass,
}

impl PassMethod {
    pub const ALL: [PassMethod; 9] = [
        PassMethod::IdentityPass,
        PassMethod::DriftPass,
        PassMethod::StrMpoleSymplectic4Pass,
        PassMethod::BndMpoleSymplectic4Pass,
        PassMethod::CorrectorPass,
        PassMethod::CavityPass,
        PassMethod::ThinQuadPass,
        PassMethod::ThinSextPass,
        PassMethod::KicktablePass,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PassMethod::IdentityPass => "identity_pass",
            PassMethod::DriftPass => "drift_pass",
            PassMethod::StrMpoleSymplectic4Pass => "str_mpole_symplectic4_pass",
            PassMethod::BndMpoleSymplectic4Pass => "bnd_mpole_symplectic4_pass",
            PassMethod::CorrectorPass => "corrector_pass",
            PassMethod::CavityPass => "cavity_pass",
            PassMethod::ThinQuadPass => "thinquad_pass",
            PassMethod::ThinSextPass => "thinsext_pass",
            PassMethod::KicktablePass => "kicktable_pass",
        }
    }

    /// Resolve a wire name; `None` for an unknown pass method.
    pub fn from_name(name: &str) -> Option<PassMethod> {
        PassMethod::ALL.iter().copied().find(|pm| pm.as_str() == name)
    }
}

impl fmt::Display for PassMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const R_IDENTITY: [f64; 36] = {
    let mut r = [0.0; 36];
    let mut i = 0;
    while i < 6 {
        r[i * 6 + i] = 1.0;
        i += 1;
    }
    r
};

/// One lattice element. Holds every parameter any pass method may consume;
/// the `pass_method` tag selects which subset is live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub fam_name: String,
    pub pass_method: PassMethod,
    /// Element length [m].
    pub length: f64,
    /// Integration slices for the symplectic multipole passes.
    pub nr_steps: usize,
    /// Vacuum-chamber half-apertures [m]; `hmin ≤ hmax`, `vmin ≤ vmax`.
    pub hmin: f64,
    pub hmax: f64,
    pub vmin: f64,
    pub vmax: f64,
    /// Corrector kicks [rad].
    pub hkick: f64,
    pub vkick: f64,
    /// Bending angle and edge angles [rad].
    pub angle: f64,
    pub angle_in: f64,
    pub angle_out: f64,
    /// Magnet gap [m] and fringe-field integrals for the dipole edges.
    pub gap: f64,
    pub fint_in: f64,
    pub fint_out: f64,
    /// Thin-lens integrated strengths: KL [1/m] and SL [1/m²].
    pub thin_kl: f64,
    pub thin_sl: f64,
    /// RF parameters.
    pub frequency: f64, // [Hz]
    pub voltage: f64,   // [V]
    /// Skew and normal multipole coefficients, kept at equal length.
    pub polynom_a: Vec<f64>,
    pub polynom_b: Vec<f64>,
    /// Entry/exit misalignment: translations and 6×6 row-major linear maps.
    pub t_in: [f64; 6],
    pub t_out: [f64; 6],
    #[serde(with = "serde_r_matrix")]
    pub r_in: [f64; 36],
    #[serde(with = "serde_r_matrix")]
    pub r_out: [f64; 36],
    /// Shared, non-owning handle into the accelerator's kicktable registry.
    #[serde(skip)]
    pub kicktable: Option<Arc<Kicktable>>,
}

impl Element {
    /// Drift-type element with every other parameter at its default.
    pub fn new(fam_name: &str, length: f64) -> Self {
        Element {
            fam_name: fam_name.to_string(),
            pass_method: PassMethod::DriftPass,
            length,
            nr_steps: 1,
            hmin: -f64::MAX,
            hmax: f64::MAX,
            vmin: -f64::MAX,
            vmax: f64::MAX,
            hkick: 0.0,
            vkick: 0.0,
            angle: 0.0,
            angle_in: 0.0,
            angle_out: 0.0,
            gap: 0.0,
            fint_in: 0.0,
            fint_out: 0.0,
            thin_kl: 0.0,
            thin_sl: 0.0,
            frequency: 0.0,
            voltage: 0.0,
            polynom_a: vec![0.0; 3],
            polynom_b: vec![0.0; 3],
            t_in: [0.0; 6],
            t_out: [0.0; 6],
            r_in: R_IDENTITY,
            r_out: R_IDENTITY,
            kicktable: None,
        }
    }

    // ── Typed factories ──────────────────────────────────────────────

    pub fn marker(fam_name: &str) -> Self {
        let mut e = Element::new(fam_name, 0.0);
        e.pass_method = PassMethod::IdentityPass;
        e
    }

    pub fn bpm(fam_name: &str) -> Self {
        Element::marker(fam_name)
    }

    pub fn drift(fam_name: &str, length: f64) -> Self {
        Element::new(fam_name, length)
    }

    pub fn corrector(fam_name: &str, length: f64, hkick: f64, vkick: f64) -> Self {
        let mut e = Element::new(fam_name, length);
        e.pass_method = PassMethod::CorrectorPass;
        e.hkick = hkick;
        e.vkick = vkick;
        e
    }

    pub fn hcorrector(fam_name: &str, length: f64, hkick: f64) -> Self {
        Element::corrector(fam_name, length, hkick, 0.0)
    }

    pub fn vcorrector(fam_name: &str, length: f64, vkick: f64) -> Self {
        Element::corrector(fam_name, length, 0.0, vkick)
    }

    pub fn quadrupole(fam_name: &str, length: f64, k: f64, nr_steps: usize) -> Self {
        let mut e = Element::new(fam_name, length);
        e.pass_method = PassMethod::StrMpoleSymplectic4Pass;
        e.polynom_b[1] = k;
        e.nr_steps = nr_steps;
        e
    }

    pub fn sextupole(fam_name: &str, length: f64, s: f64, nr_steps: usize) -> Self {
        let mut e = Element::new(fam_name, length);
        e.pass_method = PassMethod::StrMpoleSymplectic4Pass;
        e.polynom_b[2] = s;
        e.nr_steps = nr_steps;
        e
    }

    pub fn thin_quadrupole(fam_name: &str, kl: f64) -> Self {
        let mut e = Element::new(fam_name, 0.0);
        e.pass_method = PassMethod::ThinQuadPass;
        e.thin_kl = kl;
        e
    }

    pub fn thin_sextupole(fam_name: &str, sl: f64) -> Self {
        let mut e = Element::new(fam_name, 0.0);
        e.pass_method = PassMethod::ThinSextPass;
        e.thin_sl = sl;
        e
    }

    #[allow(clippy::too_many_arguments)]
    pub fn rbend(
        fam_name: &str,
        length: f64,
        angle: f64,
        angle_in: f64,
        angle_out: f64,
        gap: f64,
        fint_in: f64,
        fint_out: f64,
        polynom_a: &[f64],
        polynom_b: &[f64],
        k: f64,
        s: f64,
        nr_steps: usize,
    ) -> Self {
        let mut e = Element::new(fam_name, length);
        e.pass_method = PassMethod::BndMpoleSymplectic4Pass;
        e.angle = angle;
        e.angle_in = angle_in;
        e.angle_out = angle_out;
        e.gap = gap;
        e.fint_in = fint_in;
        e.fint_out = fint_out;
        e.polynom_a = polynom_a.to_vec();
        e.polynom_b = polynom_b.to_vec();
        // The bending pass assumes quadrupole and sextupole slots exist
        // and both polynomials share one length.
        let len = e.polynom_a.len().max(e.polynom_b.len()).max(3);
        e.polynom_a.resize(len, 0.0);
        e.polynom_b.resize(len, 0.0);
        e.polynom_b[1] = k;
        e.polynom_b[2] = s;
        e.nr_steps = nr_steps;
        e
    }

    pub fn rfcavity(fam_name: &str, length: f64, frequency: f64, voltage: f64) -> Self {
        let mut e = Element::new(fam_name, length);
        e.pass_method = PassMethod::CavityPass;
        e.frequency = frequency;
        e.voltage = voltage;
        e
    }

    // ── Misalignment queries ─────────────────────────────────────────

    pub fn has_t_in(&self) -> bool {
        self.t_in.iter().any(|&v| v != 0.0)
    }

    pub fn has_t_out(&self) -> bool {
        self.t_out.iter().any(|&v| v != 0.0)
    }

    pub fn has_r_in(&self) -> bool {
        self.r_in != R_IDENTITY
    }

    pub fn has_r_out(&self) -> bool {
        self.r_out != R_IDENTITY
    }
}

impl Default for Element {
    fn default() -> Self {
        Element::new("", 0.0)
    }
}

impl PartialEq for Element {
    /// Element equality with the physical-equivalence shortcut: two
    /// drift-or-identity elements with the same name, geometry and
    /// aperture are equal regardless of the remaining fields.
    fn eq(&self, o: &Element) -> bool {
        if self.fam_name != o.fam_name
            || self.pass_method != o.pass_method
            || self.length != o.length
            || self.hmin != o.hmin
            || self.hmax != o.hmax
            || self.vmin != o.vmin
            || self.vmax != o.vmax
            || self.nr_steps != o.nr_steps
        {
            return false;
        }
        if matches!(
            self.pass_method,
            PassMethod::DriftPass | PassMethod::IdentityPass
        ) {
            return true;
        }
        if self.hkick != o.hkick
            || self.vkick != o.vkick
            || self.angle != o.angle
            || self.angle_in != o.angle_in
            || self.angle_out != o.angle_out
            || self.gap != o.gap
            || self.fint_in != o.fint_in
            || self.fint_out != o.fint_out
            || self.thin_kl != o.thin_kl
            || self.thin_sl != o.thin_sl
            || self.frequency != o.frequency
            || self.voltage != o.voltage
            || self.polynom_a != o.polynom_a
            || self.polynom_b != o.polynom_b
            || self.t_in != o.t_in
            || self.t_out != o.t_out
            || self.r_in != o.r_in
            || self.r_out != o.r_out
        {
            return false;
        }
        match (&self.kicktable, &o.kicktable) {
            (None, None) => true,
            (Some(a), Some(b)) => **a == **b,
            _ => false,
        }
    }
}

fn fmt_polynom(f: &mut fmt::Formatter<'_>, label: &str, polynom: &[f64]) -> fmt::Result {
    let order = polynom
        .iter()
        .rposition(|&c| c != 0.0)
        .map_or(0, |i| i + 1);
    if order == 0 {
        return Ok(());
    }
    write!(f, "\n{label}")?;
    for c in &polynom[..order] {
        write!(f, "{c} ")?;
    }
    Ok(())
}

impl fmt::Display for Element {
    /// Non-default parameters only, in the historical field order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fam_name      : {}", self.fam_name)?;
        if self.length != 0.0 {
            write!(f, "\nlength        : {}", self.length)?;
        }
        write!(f, "\npass_method   : {}", self.pass_method)?;
        if self.nr_steps > 1 {
            write!(f, "\nnr_steps      : {}", self.nr_steps)?;
        }
        if self.thin_kl != 0.0 {
            write!(f, "\nthin_KL       : {}", self.thin_kl)?;
        }
        if self.thin_sl != 0.0 {
            write!(f, "\nthin_SL       : {}", self.thin_sl)?;
        }
        if self.angle != 0.0 {
            write!(f, "\nbending_angle : {}", self.angle)?;
            write!(f, "\nentrance_angle: {}", self.angle_in)?;
            write!(f, "\nexit_angle    : {}", self.angle_out)?;
        }
        if self.gap != 0.0 && (self.fint_in != 0.0 || self.fint_out != 0.0) {
            write!(f, "\ngap           : {}", self.gap)?;
            write!(f, "\nfint_in       : {}", self.fint_in)?;
            write!(f, "\nfint_out      : {}", self.fint_out)?;
        }
        fmt_polynom(f, "polynom_a     : ", &self.polynom_a)?;
        fmt_polynom(f, "polynom_b     : ", &self.polynom_b)?;
        if self.frequency != 0.0 {
            write!(f, "\nfrequency     : {}", self.frequency)?;
        }
        if self.voltage != 0.0 {
            write!(f, "\nvoltage       : {}", self.voltage)?;
        }
        Ok(())
    }
}

/// Serde passthrough for the 6×6 row-major arrays (serde has no built-in
/// impls at this length).
mod serde_r_matrix {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(m: &[f64; 36], s: S) -> Result<S::Ok, S::Error> {
        m.as_slice().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[f64; 36], D::Error> {
        let v = Vec::<f64>::deserialize(d)?;
        v.try_into()
            .map_err(|_| D::Error::custom("expected 36 matrix entries"))
    }
}
