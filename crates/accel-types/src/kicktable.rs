// ─────────────────────────────────────────────────────────────────────
// SCPN Accel Core — Kicktable
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Insertion-device kick map sampled on a rectangular transverse grid.
//!
//! File layout (text): two description lines, the device length, the
//! horizontal and vertical point counts, then one kick table per plane.
//! Each table is a row of x positions followed by one row per y position
//! (descending y): the y value and the kicks for every x.

use crate::error::{TrackError, TrackResult};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Rectangular grid of horizontal and vertical kicks as a function of the
/// transverse offsets `(x, y)`. Owned by the accelerator's registry and
/// shared by reference across elements.
#[derive(Debug, Clone)]
pub struct Kicktable {
    pub filename: String,
    /// Device length [m]; the kicktable pass uses it, not `Element::length`.
    pub length: f64,
    pub x_min: f64,
    pub x_max: f64,
    pub x_nrpts: usize,
    pub y_min: f64,
    pub y_max: f64,
    pub y_nrpts: usize,
    /// Kick grids indexed `[iy, ix]` with ascending axes.
    pub x_kick: Array2<f64>,
    pub y_kick: Array2<f64>,
}

struct NumberedLines {
    lines: Vec<(usize, String)>,
    cursor: usize,
}

impl NumberedLines {
    fn next(&mut self, what: &str) -> TrackResult<(usize, &str)> {
        let Some((number, text)) = self.lines.get(self.cursor) else {
            return Err(TrackError::FlatFile {
                line: self.lines.last().map_or(0, |(n, _)| *n),
                message: format!("kicktable truncated, expected {what}"),
            });
        };
        self.cursor += 1;
        Ok((*number, text))
    }
}

fn parse_row(line: &str, number: usize, expected: usize) -> TrackResult<Vec<f64>> {
    let values: Vec<f64> = line
        .split_whitespace()
        .map_while(|t| t.parse().ok())
        .collect();
    if values.len() != expected {
        return Err(TrackError::FlatFile {
            line: number,
            message: format!(
                "kicktable row has {} values, expected {expected}",
                values.len()
            ),
        });
    }
    Ok(values)
}

impl Kicktable {
    pub fn load_from_file(path: &Path) -> TrackResult<Kicktable> {
        let file = File::open(path)
            .map_err(|_| TrackError::FileNotFound(path.display().to_string()))?;
        Kicktable::parse(BufReader::new(file), path.display().to_string())
    }

    /// Parse the kicktable text format from any buffered reader.
    pub fn parse<R: BufRead>(reader: R, filename: String) -> TrackResult<Kicktable> {
        let mut lines = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                lines.push((idx + 1, trimmed.to_string()));
            }
        }
        let mut input = NumberedLines { lines, cursor: 0 };

        // Header: name, author, length label + value, point-count labels.
        input.next("the kicktable name")?;
        input.next("the author line")?;
        input.next("the length label")?;
        let (number, text) = input.next("the device length")?;
        let length = parse_row(text, number, 1)?[0];
        input.next("the horizontal point-count label")?;
        let (number, text) = input.next("the horizontal point count")?;
        let x_nrpts = parse_row(text, number, 1)?[0] as usize;
        input.next("the vertical point-count label")?;
        let (number, text) = input.next("the vertical point count")?;
        let y_nrpts = parse_row(text, number, 1)?[0] as usize;
        if x_nrpts < 2 || y_nrpts < 2 {
            return Err(TrackError::FlatFile {
                line: number,
                message: format!("kicktable grid too small: {x_nrpts}×{y_nrpts}"),
            });
        }

        let mut table = Kicktable {
            filename,
            length,
            x_min: f64::NAN,
            x_max: f64::NAN,
            x_nrpts,
            y_min: f64::NAN,
            y_max: f64::NAN,
            y_nrpts,
            x_kick: Array2::zeros((y_nrpts, x_nrpts)),
            y_kick: Array2::zeros((y_nrpts, x_nrpts)),
        };
        table.read_plane(&mut input, true)?;
        table.read_plane(&mut input, false)?;
        Ok(table)
    }

    fn read_plane(&mut self, input: &mut NumberedLines, horizontal: bool) -> TrackResult<()> {
        input.next("the kick-table label")?;
        input.next("the START marker")?;
        let (number, text) = input.next("the x-position row")?;
        let xs = parse_row(text, number, self.x_nrpts)?;
        for &x in &xs {
            if self.x_min.is_nan() || x < self.x_min {
                self.x_min = x;
            }
            if self.x_max.is_nan() || x > self.x_max {
                self.x_max = x;
            }
        }
        // Rows are stored top-down: highest y first.
        for iy in (0..self.y_nrpts).rev() {
            let (number, text) = input.next("a kick row")?;
            let row = parse_row(text, number, self.x_nrpts + 1)?;
            let y = row[0];
            if self.y_min.is_nan() || y < self.y_min {
                self.y_min = y;
            }
            if self.y_max.is_nan() || y > self.y_max {
                self.y_max = y;
            }
            let grid = if horizontal {
                &mut self.x_kick
            } else {
                &mut self.y_kick
            };
            for ix in 0..self.x_nrpts {
                grid[[iy, ix]] = row[ix + 1];
            }
        }
        Ok(())
    }

    /// Whether `(rx, ry)` falls inside the sampled rectangle.
    pub fn contains(&self, rx: f64, ry: f64) -> bool {
        rx >= self.x_min && rx <= self.x_max && ry >= self.y_min && ry <= self.y_max
    }
}

impl PartialEq for Kicktable {
    /// Content equality; the source filename does not participate.
    fn eq(&self, o: &Kicktable) -> bool {
        self.length == o.length
            && self.x_min == o.x_min
            && self.x_max == o.x_max
            && self.y_min == o.y_min
            && self.y_max == o.y_max
            && self.x_kick == o.x_kick
            && self.y_kick == o.y_kick
    }
}
