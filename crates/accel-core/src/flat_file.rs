// ─────────────────────────────────────────────────────────────────────
// SCPN Accel Core — Flat File
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Reader and writer for the flat lattice file format.
//!
//! Line-oriented text: `#` starts a comment, `%` a header parameter
//! (`energy`, `harmonic_number` and the three switches), and a
//! `fam_name` line opens a new element, committing the previous one.
//! The writer emits only parameters that differ from their defaults,
//! keeping files stable and diff-friendly.

use accel_types::accelerator::Accelerator;
use accel_types::element::{Element, PassMethod};
use accel_types::error::{TrackError, TrackResult};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const PARAM_WIDTH: usize = 16;

// ── Reading ──────────────────────────────────────────────────────────

pub fn read_flat_file(path: impl AsRef<Path>) -> TrackResult<Accelerator> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|_| TrackError::FileNotFound(path.display().to_string()))?;
    parse_flat_file(&text, path.parent())
}

/// Parse a flat file held in memory. Kicktable references are resolved
/// against the working directory.
pub fn read_flat_file_str(text: &str) -> TrackResult<Accelerator> {
    parse_flat_file(text, None)
}

fn bad_line(line: usize, message: impl Into<String>) -> TrackError {
    TrackError::FlatFile {
        line,
        message: message.into(),
    }
}

fn parse_f64<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    line: usize,
    key: &str,
) -> TrackResult<f64> {
    tokens
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| bad_line(line, format!("expected a number after '{key}'")))
}

fn parse_array6<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    line: usize,
    key: &str,
) -> TrackResult<[f64; 6]> {
    let mut out = [0.0; 6];
    for slot in &mut out {
        *slot = parse_f64(tokens, line, key)?;
    }
    Ok(out)
}

/// `(order, value)` pairs; the polynomial is resized to the highest
/// order present and zero-filled.
fn parse_polynom<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    line: usize,
    key: &str,
    polynom: &mut Vec<f64>,
) -> TrackResult<()> {
    let mut pairs = Vec::new();
    let mut size = 0;
    while let Some(order_token) = tokens.next() {
        let order: usize = order_token
            .parse()
            .map_err(|_| bad_line(line, format!("bad monomial order in '{key}'")))?;
        let value = parse_f64(tokens, line, key)?;
        size = size.max(order + 1);
        pairs.push((order, value));
    }
    if size > 0 {
        polynom.clear();
        polynom.resize(size, 0.0);
        for (order, value) in pairs {
            polynom[order] = value;
        }
    }
    Ok(())
}

fn synchronize_polynomials(element: &mut Element) {
    let size = element.polynom_a.len().max(element.polynom_b.len());
    element.polynom_a.resize(size, 0.0);
    element.polynom_b.resize(size, 0.0);
}

/// Row index into `r_in`/`r_out` for the matrix line labels.
fn r_matrix_row(key: &str) -> Option<(bool, usize)> {
    let (coord, matrix) = key.split_once('|')?;
    let row = ["rx", "px", "ry", "py", "de", "dl"]
        .iter()
        .position(|&c| c == coord)?;
    match matrix {
        "r_in" => Some((true, row)),
        "r_out" => Some((false, row)),
        _ => None,
    }
}

fn parse_flat_file(text: &str, base_dir: Option<&Path>) -> TrackResult<Accelerator> {
    let mut accelerator = Accelerator::default();
    let mut element = Element::default();
    // One-shot symmetric-aperture flags; file-scoped, not reset per
    // element (historical behavior, pinned by test).
    let mut found_hmin = false;
    let mut found_vmin = false;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let mut tokens = raw.split_whitespace();
        let Some(cmd) = tokens.next() else { continue };
        if cmd.starts_with('#') {
            continue;
        }
        if cmd.starts_with('%') {
            let Some(key) = tokens.next() else { continue };
            match key {
                "energy" => accelerator.energy = parse_f64(&mut tokens, line, key)?,
                "harmonic_number" => {
                    accelerator.harmonic_number = tokens
                        .next()
                        .and_then(|t| t.parse().ok())
                        .ok_or_else(|| bad_line(line, "expected a harmonic number"))?
                }
                "cavity_on" => accelerator.cavity_on = tokens.next() == Some("true"),
                "radiation_on" => accelerator.radiation_on = tokens.next() == Some("true"),
                "vchamber_on" => accelerator.vchamber_on = tokens.next() == Some("true"),
                _ => {}
            }
            continue;
        }

        match cmd {
            "fam_name" => {
                if !element.fam_name.is_empty() {
                    accelerator.lattice.push(std::mem::take(&mut element));
                }
                element.fam_name = tokens
                    .next()
                    .ok_or_else(|| bad_line(line, "missing family name"))?
                    .to_string();
            }
            "length" => element.length = parse_f64(&mut tokens, line, cmd)?,
            "nr_steps" => {
                element.nr_steps = tokens
                    .next()
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| bad_line(line, "expected a step count"))?
            }
            "hmin" => {
                element.hmin = parse_f64(&mut tokens, line, cmd)?;
                found_hmin = true;
            }
            "hmax" => {
                element.hmax = parse_f64(&mut tokens, line, cmd)?;
                if !found_hmin {
                    element.hmin = -element.hmax;
                }
                found_hmin = false;
            }
            "vmin" => {
                element.vmin = parse_f64(&mut tokens, line, cmd)?;
                found_vmin = true;
            }
            "vmax" => {
                element.vmax = parse_f64(&mut tokens, line, cmd)?;
                if !found_vmin {
                    element.vmin = -element.vmax;
                }
                found_vmin = false;
            }
            "hkick" => element.hkick = parse_f64(&mut tokens, line, cmd)?,
            "vkick" => element.vkick = parse_f64(&mut tokens, line, cmd)?,
            "angle" => element.angle = parse_f64(&mut tokens, line, cmd)?,
            "angle_in" => element.angle_in = parse_f64(&mut tokens, line, cmd)?,
            "angle_out" => element.angle_out = parse_f64(&mut tokens, line, cmd)?,
            "gap" => element.gap = parse_f64(&mut tokens, line, cmd)?,
            "fint_in" => element.fint_in = parse_f64(&mut tokens, line, cmd)?,
            "fint_out" => element.fint_out = parse_f64(&mut tokens, line, cmd)?,
            "thin_kl" => element.thin_kl = parse_f64(&mut tokens, line, cmd)?,
            "thin_sl" => element.thin_sl = parse_f64(&mut tokens, line, cmd)?,
            "voltage" => element.voltage = parse_f64(&mut tokens, line, cmd)?,
            "frequency" => element.frequency = parse_f64(&mut tokens, line, cmd)?,
            "t_in" => element.t_in = parse_array6(&mut tokens, line, cmd)?,
            "t_out" => element.t_out = parse_array6(&mut tokens, line, cmd)?,
            "pass_method" => {
                let name = tokens
                    .next()
                    .ok_or_else(|| bad_line(line, "missing pass method name"))?;
                let Some(pass_method) = PassMethod::from_name(name) else {
                    return Err(TrackError::PassMethodNotDefined(name.to_string()));
                };
                element.pass_method = pass_method;
                if pass_method == PassMethod::KicktablePass {
                    let filename = format!("{}.txt", element.fam_name);
                    let path = match base_dir {
                        Some(dir) => dir.join(&filename),
                        None => filename.into(),
                    };
                    element.kicktable = Some(accelerator.add_kicktable(&path)?);
                }
            }
            "polynom_a" => {
                parse_polynom(&mut tokens, line, cmd, &mut element.polynom_a)?;
                synchronize_polynomials(&mut element);
            }
            "polynom_b" => {
                parse_polynom(&mut tokens, line, cmd, &mut element.polynom_b)?;
                synchronize_polynomials(&mut element);
            }
            _ => {
                if let Some((is_in, row)) = r_matrix_row(cmd) {
                    let values = parse_array6(&mut tokens, line, cmd)?;
                    let matrix = if is_in {
                        &mut element.r_in
                    } else {
                        &mut element.r_out
                    };
                    matrix[row * 6..row * 6 + 6].copy_from_slice(&values);
                } else if raw.len() >= 2 {
                    return Err(bad_line(line, format!("unrecognized parameter '{cmd}'")));
                }
            }
        }
    }

    if !element.fam_name.is_empty() {
        accelerator.lattice.push(element);
    }
    Ok(accelerator)
}

// ── Writing ──────────────────────────────────────────────────────────

pub fn write_flat_file(path: impl AsRef<Path>, accelerator: &Accelerator) -> TrackResult<()> {
    let path = path.as_ref();
    fs::write(path, write_flat_file_str(accelerator))
        .map_err(|_| TrackError::FileNotFound(path.display().to_string()))
}

/// Seventeen-digit uppercase scientific notation with explicit signs,
/// two-digit-minimum exponent.
fn fmt_sci(value: f64) -> String {
    let formatted = format!("{value:+.17E}");
    // Non-finite values carry no exponent; emit them verbatim.
    let Some((mantissa, exponent)) = formatted.split_once('E') else {
        return formatted;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{mantissa}E{sign}{digits:0>2}")
}

fn push_param(out: &mut String, label: &str, value: &str) {
    let _ = writeln!(out, "{label:<width$}{value}", width = PARAM_WIDTH);
}

fn push_param_if(out: &mut String, label: &str, value: f64) {
    if value != 0.0 {
        push_param(out, label, &fmt_sci(value));
    }
}

fn push_vector6(out: &mut String, label: &str, values: &[f64]) {
    let row: Vec<String> = values.iter().map(|&v| fmt_sci(v)).collect();
    push_param(out, label, &row.join("  "));
}

fn push_polynom(out: &mut String, label: &str, polynom: &[f64]) {
    if polynom.iter().all(|&c| c == 0.0) {
        return;
    }
    let pairs: Vec<String> = polynom
        .iter()
        .enumerate()
        .filter(|(_, &c)| c != 0.0)
        .map(|(order, &c)| format!("{order} {}", fmt_sci(c)))
        .collect();
    push_param(out, label, &pairs.join(" "));
}

pub fn write_flat_file_str(accelerator: &Accelerator) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<18}{} eV", "% energy", fmt_sci(accelerator.energy));
    let _ = writeln!(
        out,
        "{:<18}{}",
        "% harmonic_number", accelerator.harmonic_number
    );
    let _ = writeln!(out, "{:<18}{}", "% cavity_on", accelerator.cavity_on);
    let _ = writeln!(out, "{:<18}{}", "% radiation_on", accelerator.radiation_on);
    let _ = writeln!(out, "{:<18}{}", "% vchamber_on", accelerator.vchamber_on);
    out.push('\n');

    for (index, e) in accelerator.lattice.iter().enumerate() {
        let _ = writeln!(out, "### {index:04} ###");
        push_param(&mut out, "fam_name", &e.fam_name);
        push_param(&mut out, "length", &fmt_sci(e.length));
        push_param(&mut out, "pass_method", e.pass_method.as_str());
        if e.nr_steps != 1 {
            push_param(&mut out, "nr_steps", &e.nr_steps.to_string());
        }
        push_param_if(&mut out, "thin_kl", e.thin_kl);
        push_param_if(&mut out, "thin_sl", e.thin_sl);
        push_polynom(&mut out, "polynom_a", &e.polynom_a);
        push_polynom(&mut out, "polynom_b", &e.polynom_b);
        push_param_if(&mut out, "hmin", e.hmin);
        push_param_if(&mut out, "hmax", e.hmax);
        push_param_if(&mut out, "vmin", e.vmin);
        push_param_if(&mut out, "vmax", e.vmax);
        push_param_if(&mut out, "hkick", e.hkick);
        push_param_if(&mut out, "vkick", e.vkick);
        push_param_if(&mut out, "angle", e.angle);
        push_param_if(&mut out, "gap", e.gap);
        push_param_if(&mut out, "fint_in", e.fint_in);
        push_param_if(&mut out, "fint_out", e.fint_out);
        push_param_if(&mut out, "voltage", e.voltage);
        push_param_if(&mut out, "frequency", e.frequency);
        push_param_if(&mut out, "angle_in", e.angle_in);
        push_param_if(&mut out, "angle_out", e.angle_out);
        if e.has_t_in() {
            push_vector6(&mut out, "t_in", &e.t_in);
        }
        if e.has_t_out() {
            push_vector6(&mut out, "t_out", &e.t_out);
        }
        if e.has_r_in() {
            for (row, coord) in ["rx", "px", "ry", "py", "de", "dl"].iter().enumerate() {
                push_vector6(
                    &mut out,
                    &format!("{coord}|r_in"),
                    &e.r_in[row * 6..row * 6 + 6],
                );
            }
        }
        if e.has_r_out() {
            for (row, coord) in ["rx", "px", "ry", "py", "de", "dl"].iter().enumerate() {
                push_vector6(
                    &mut out,
                    &format!("{coord}|r_out"),
                    &e.r_out[row * 6..row * 6 + 6],
                );
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_sci_shape() {
        assert_eq!(fmt_sci(0.0), "+0.00000000000000000E+00");
        assert_eq!(fmt_sci(1.0), "+1.00000000000000000E+00");
        assert_eq!(fmt_sci(-2.5e-5), "-2.50000000000000000E-05");
    }

    #[test]
    fn test_header_parameters_are_read() {
        let text = "\
% energy          +3.00000000000000000E+09 eV
% harmonic_number 864
% cavity_on       true
% radiation_on    false
% vchamber_on     true
";
        let acc = read_flat_file_str(text).unwrap();
        assert_eq!(acc.energy, 3e9);
        assert_eq!(acc.harmonic_number, 864);
        assert!(acc.cavity_on && !acc.radiation_on && acc.vchamber_on);
    }

    #[test]
    fn test_elements_are_committed_on_each_new_fam_name() {
        let text = "\
fam_name        d1
length          +1.00000000000000000E+00
pass_method     drift_pass

fam_name        qf
length          +2.50000000000000000E-01
pass_method     str_mpole_symplectic4_pass
nr_steps        10
polynom_b       1 +1.80000000000000000E+00
";
        let acc = read_flat_file_str(text).unwrap();
        assert_eq!(acc.lattice.len(), 2);
        assert_eq!(acc.lattice[0].fam_name, "d1");
        assert_eq!(acc.lattice[1].polynom_b, vec![0.0, 1.8]);
        assert_eq!(acc.lattice[1].polynom_a, vec![0.0, 0.0]);
        assert_eq!(acc.lattice[1].nr_steps, 10);
    }

    #[test]
    fn test_hmax_alone_mirrors_into_hmin() {
        let text = "\
fam_name        d1
pass_method     drift_pass
hmax            +1.00000000000000000E-02
vmin            -3.00000000000000000E-03
vmax            +2.00000000000000000E-03
";
        let acc = read_flat_file_str(text).unwrap();
        let e = &acc.lattice[0];
        assert_eq!(e.hmin, -1e-2);
        assert_eq!(e.hmax, 1e-2);
        // An explicit vmin is kept even when asymmetric.
        assert_eq!(e.vmin, -3e-3);
        assert_eq!(e.vmax, 2e-3);
    }

    #[test]
    fn test_hmin_flag_is_one_shot_and_file_scoped() {
        // d1 sets hmin with no matching hmax; the stale flag then
        // suppresses the mirror rule for d2's hmax.
        let text = "\
fam_name        d1
pass_method     drift_pass
hmin            -5.00000000000000000E-03

fam_name        d2
pass_method     drift_pass
hmax            +1.00000000000000000E-02
";
        let acc = read_flat_file_str(text).unwrap();
        assert_eq!(acc.lattice[0].hmin, -5e-3);
        assert_eq!(acc.lattice[1].hmax, 1e-2);
        assert_eq!(acc.lattice[1].hmin, -f64::MAX);
    }

    #[test]
    fn test_unknown_pass_method_aborts() {
        let text = "\
fam_name        d1
pass_method     warp_drive_pass
";
        let err = read_flat_file_str(text).unwrap_err();
        assert!(matches!(err, TrackError::PassMethodNotDefined(name) if name == "warp_drive_pass"));
    }

    #[test]
    fn test_unrecognized_parameter_reports_line() {
        let text = "\
fam_name        d1
pass_method     drift_pass
wavelength      +1.00000000000000000E+00
";
        let err = read_flat_file_str(text).unwrap_err();
        match err {
            TrackError::FlatFile { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("wavelength"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_r_matrix_rows_round_trip() {
        let mut acc = Accelerator::new(3e9, 864);
        let mut q = Element::quadrupole("qr", 0.25, 1.8, 10);
        // Small roll: coupled rotation blocks.
        let (c, s) = (0.1_f64.cos(), 0.1_f64.sin());
        q.r_in[0] = c;
        q.r_in[2] = s;
        q.r_in[12] = -s;
        q.r_in[14] = c;
        q.r_out[0] = c;
        q.r_out[2] = -s;
        q.r_out[12] = s;
        q.r_out[14] = c;
        q.t_in[0] = 1e-4;
        q.t_out[0] = -1e-4;
        acc.lattice.push(q);

        let round = read_flat_file_str(&write_flat_file_str(&acc)).unwrap();
        assert_eq!(round, acc);
    }

    #[test]
    fn test_writer_skips_defaults() {
        let mut acc = Accelerator::new(3e9, 864);
        acc.lattice.push(Element::marker("m1"));
        let text = write_flat_file_str(&acc);
        assert!(text.contains("pass_method     identity_pass"));
        assert!(!text.contains("nr_steps"));
        assert!(!text.contains("polynom_a"));
        assert!(!text.contains("t_in"));
        assert!(!text.contains("r_in"));
    }
}
