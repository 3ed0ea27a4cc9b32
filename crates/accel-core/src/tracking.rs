// ─────────────────────────────────────────────────────────────────────
// SCPN Accel Core — Tracking
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Element dispatch and line/ring tracking with vacuum-chamber loss
//! detection.

use crate::passmethods;
use accel_types::accelerator::Accelerator;
use accel_types::element::{Element, PassMethod};
use accel_types::error::{LostPlane, TrackError, TrackResult};
use accel_types::pos::Pos;

/// Advance one particle through one element. Dispatch is a plain match
/// over the closed pass-method set so it inlines in the tracking loop;
/// unknown pass-method names can only arise at parse time.
pub fn element_pass(
    accelerator: &Accelerator,
    element: &Element,
    pos: &mut Pos,
) -> TrackResult<()> {
    match element.pass_method {
        PassMethod::IdentityPass => passmethods::identity_pass(pos, element, accelerator),
        PassMethod::DriftPass => passmethods::drift_pass(pos, element, accelerator),
        PassMethod::StrMpoleSymplectic4Pass => {
            passmethods::str_mpole_symplectic4_pass(pos, element, accelerator)
        }
        PassMethod::BndMpoleSymplectic4Pass => {
            passmethods::bnd_mpole_symplectic4_pass(pos, element, accelerator)
        }
        PassMethod::CorrectorPass => passmethods::corrector_pass(pos, element, accelerator),
        PassMethod::CavityPass => passmethods::cavity_pass(pos, element, accelerator),
        PassMethod::ThinQuadPass => passmethods::thinquad_pass(pos, element, accelerator),
        PassMethod::ThinSextPass => passmethods::thinsext_pass(pos, element, accelerator),
        PassMethod::KicktablePass => passmethods::kicktable_pass(pos, element, accelerator),
    }
}

/// Track one particle through the full line, starting at `element_offset`
/// and wrapping modulo the lattice length.
///
/// `out` is appended to and deliberately never cleared: the closed-orbit
/// solver accumulates several trajectories into one preallocated buffer.
/// With `trajectory` set, the coordinate at the entrance of every element
/// is recorded; the exit coordinate of the line is appended on clean
/// completion either way. On loss a NaN-filled sentinel is appended
/// instead and `element_offset` is left at the offending element.
///
/// Loss checks run horizontally first: a non-finite `rx` counts as lost
/// regardless of `vchamber_on`; the aperture comparison itself only runs
/// with the chamber switched on. Vertically alike.
pub fn line_pass(
    accelerator: &Accelerator,
    pos: &mut Pos,
    out: &mut Vec<Pos>,
    element_offset: &mut usize,
    trajectory: bool,
) -> TrackResult<()> {
    let nr_elements = accelerator.lattice.len();
    if nr_elements == 0 {
        out.push(*pos);
        return Ok(());
    }
    *element_offset %= nr_elements;

    for _ in 0..nr_elements {
        let element = &accelerator.lattice[*element_offset];
        if trajectory {
            out.push(*pos);
        }

        element_pass(accelerator, element, pos)?;

        if !pos.rx.is_finite()
            || (accelerator.vchamber_on && (pos.rx < element.hmin || pos.rx > element.hmax))
        {
            out.push(Pos::nan());
            return Err(TrackError::ParticleLost {
                plane: LostPlane::Horizontal,
            });
        }
        if !pos.ry.is_finite()
            || (accelerator.vchamber_on && (pos.ry < element.vmin || pos.ry > element.vmax))
        {
            out.push(Pos::nan());
            return Err(TrackError::ParticleLost {
                plane: LostPlane::Vertical,
            });
        }

        *element_offset = (*element_offset + 1) % nr_elements;
    }

    out.push(*pos);
    Ok(())
}

/// Track a particle for `nr_turns` turns around the ring.
///
/// With `trajectory` set, the post-turn coordinate is appended after each
/// completed turn; otherwise only the final coordinate is appended. On
/// failure `lost_turn` holds the turn index at which tracking stopped
/// (and equals `nr_turns` after a clean run); `element_offset` carries
/// over between turns, so tracking can start mid-lattice.
pub fn ring_pass(
    accelerator: &Accelerator,
    pos: &mut Pos,
    out: &mut Vec<Pos>,
    nr_turns: usize,
    lost_turn: &mut usize,
    element_offset: &mut usize,
    trajectory: bool,
) -> TrackResult<()> {
    let mut turn_scratch: Vec<Pos> = Vec::with_capacity(1);

    *lost_turn = 0;
    while *lost_turn < nr_turns {
        turn_scratch.clear();
        line_pass(accelerator, pos, &mut turn_scratch, element_offset, false)?;
        if trajectory {
            out.push(*pos);
        }
        *lost_turn += 1;
    }

    if !trajectory {
        out.push(*pos);
    }
    Ok(())
}
