// ─────────────────────────────────────────────────────────────────────
// SCPN Accel Core — Accelerator
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Machine description: the ordered lattice, the global tracking switches
//! and the registry of shared kicktables.

use crate::element::Element;
use crate::error::TrackResult;
use crate::kicktable::Kicktable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Read-only machine model consumed by the trackers. Immutable during
/// tracking; concurrent workers may share references freely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Accelerator {
    /// Beam energy [eV].
    pub energy: f64,
    pub harmonic_number: u32,
    pub cavity_on: bool,
    pub radiation_on: bool,
    pub vchamber_on: bool,
    pub lattice: Vec<Element>,
    /// Kicktables keyed by source filename; elements hold `Arc` handles
    /// into this registry, never their own copies.
    #[serde(skip)]
    pub kicktables: HashMap<String, Arc<Kicktable>>,
}

impl Accelerator {
    pub fn new(energy: f64, harmonic_number: u32) -> Self {
        Accelerator {
            energy,
            harmonic_number,
            ..Accelerator::default()
        }
    }

    /// Total lattice length [m].
    pub fn length(&self) -> f64 {
        self.lattice.iter().map(|e| e.length).sum()
    }

    /// Fetch a kicktable from the registry, loading and inserting it on
    /// first use. Repeated requests for the same file share one table.
    pub fn add_kicktable(&mut self, path: &Path) -> TrackResult<Arc<Kicktable>> {
        let key = path.display().to_string();
        if let Some(table) = self.kicktables.get(&key) {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(Kicktable::load_from_file(path)?);
        self.kicktables.insert(key, Arc::clone(&table));
        Ok(table)
    }
}

impl PartialEq for Accelerator {
    /// Machine equality: globals and lattice (element equality already
    /// compares attached kicktable contents); the registry itself is an
    /// implementation detail.
    fn eq(&self, o: &Accelerator) -> bool {
        self.energy == o.energy
            && self.harmonic_number == o.harmonic_number
            && self.cavity_on == o.cavity_on
            && self.radiation_on == o.radiation_on
            && self.vchamber_on == o.vchamber_on
            && self.lattice == o.lattice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_accelerator_has_all_switches_off() {
        let acc = Accelerator::new(3e9, 864);
        assert_eq!(acc.energy, 3e9);
        assert_eq!(acc.harmonic_number, 864);
        assert!(!acc.cavity_on && !acc.radiation_on && !acc.vchamber_on);
        assert!(acc.lattice.is_empty());
    }

    #[test]
    fn test_length_sums_the_lattice() {
        let mut acc = Accelerator::new(3e9, 864);
        acc.lattice.push(Element::drift("d1", 1.25));
        acc.lattice.push(Element::marker("m1"));
        acc.lattice.push(Element::drift("d2", 0.75));
        assert!((acc.length() - 2.0).abs() < 1e-15);
    }

    #[test]
    fn test_equality_ignores_the_registry() {
        let mut a = Accelerator::new(3e9, 864);
        let mut b = Accelerator::new(3e9, 864);
        a.lattice.push(Element::drift("d1", 1.0));
        b.lattice.push(Element::drift("d1", 1.0));
        assert_eq!(a, b);
        b.vchamber_on = true;
        assert_ne!(a, b);
    }
}
