// ─────────────────────────────────────────────────────────────────────
// SCPN Accel Core — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Speed of light in vacuum (m/s).
pub const LIGHT_SPEED: f64 = 299_792_458.0;

/// 2π.
pub const TWOPI: f64 = 2.0 * std::f64::consts::PI;

/// Sands' radiation constant Cγ (m/GeV³) for electrons.
pub const CGAMMA: f64 = 8.846056192e-5;

/// Forest–Ruth 4th-order composition coefficients (Yoshida scheme).
/// Per integration slice: drift(D1) kick(K1) drift(D2) kick(K2)
/// drift(D2) kick(K1) drift(D1), lengths in units of the slice length.
pub const DRIFT1: f64 = 0.675_603_595_979_828_663_8;
pub const DRIFT2: f64 = -0.175_603_595_979_828_663_9;
pub const KICK1: f64 = 1.351_207_191_959_657_328;
pub const KICK2: f64 = -1.702_414_383_919_314_656;
