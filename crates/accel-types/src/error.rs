// ─────────────────────────────────────────────────────────────────────
// SCPN Accel Core — Error
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use std::fmt;
use thiserror::Error;

/// Transverse plane in which a particle hit the vacuum chamber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LostPlane {
    NoPlane,
    Horizontal,
    Vertical,
}

impl fmt::Display for LostPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LostPlane::NoPlane => write!(f, "none"),
            LostPlane::Horizontal => write!(f, "horizontal"),
            LostPlane::Vertical => write!(f, "vertical"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("pass method not defined: {0}")]
    PassMethodNotDefined(String),

    #[error("pass method not implemented: {0}")]
    PassMethodNotImplemented(String),

    #[error("particle lost ({plane} plane)")]
    ParticleLost { plane: LostPlane },

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("flat file error at line {line}: {message}")]
    FlatFile { line: usize, message: String },

    #[error("kicktable lookup out of range: rx={rx}, ry={ry}")]
    KicktableOutOfRange { rx: f64, ry: f64 },

    #[error("closed-orbit search did not converge: {0}")]
    FindOrbitNotConverged(String),

    #[error("linear algebra error: {0}")]
    LinAlg(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TrackResult<T> = Result<T, TrackError>;
