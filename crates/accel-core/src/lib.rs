// ─────────────────────────────────────────────────────────────────────
// SCPN Accel Core — Accel Core
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Charged-particle tracking engine for circular accelerators and
//! transport lines: symplectic pass methods, line/ring trackers with
//! vacuum-chamber loss detection, closed-orbit and one-turn-matrix
//! solvers, and flat-file lattice I/O.

pub mod flat_file;
pub mod orbit;
pub mod passmethods;
pub mod tracking;
