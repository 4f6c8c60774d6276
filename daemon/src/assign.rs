use std::collections::HashSet;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Highest BCM pin number exposed on the 40-pin Raspberry Pi header.
pub const MAX_BCM_PIN: u8 = 27;

/// A single tally assignment: the GPIO pin driving one light and the OBS
/// source name whose active state it mirrors.
///
/// Parsed from `"<pin>=<source>"` on the command line (`-a 11=camera 1`) or
/// from an `[[assignments]]` entry in the settings file. Immutable for the
/// lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PinAssignment {
    /// BCM pin number (0–27).
    pub pin: u8,
    /// OBS input/source name, matched verbatim against event payloads.
    pub source: String,
}

impl FromStr for PinAssignment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some((pin, source)) = s.split_once('=') else {
            bail!("expected PIN=SOURCE, got {s:?}");
        };
        let pin: u8 = pin
            .trim()
            .parse()
            .with_context(|| format!("invalid pin number in {s:?}"))?;
        if pin > MAX_BCM_PIN {
            bail!("pin {pin} is not a BCM pin (0-{MAX_BCM_PIN})");
        }
        if source.is_empty() {
            bail!("empty source name in {s:?}");
        }
        Ok(Self { pin, source: source.to_string() })
    }
}

/// The validated pin→source table, built once at startup.
///
/// Each pin appears at most once; a source name may be assigned to any number
/// of pins (several lights mirroring one camera is legal).
#[derive(Debug)]
pub struct AssignmentTable {
    assignments: Vec<PinAssignment>,
}

impl AssignmentTable {
    /// Validates `assignments` into a table. Rejects duplicate pins and pins
    /// outside the BCM range; either is a fatal configuration error.
    pub fn new(assignments: Vec<PinAssignment>) -> Result<Self> {
        let mut seen = HashSet::new();
        for a in &assignments {
            if a.pin > MAX_BCM_PIN {
                bail!("pin {} is not a BCM pin (0-{MAX_BCM_PIN})", a.pin);
            }
            if !seen.insert(a.pin) {
                bail!("pin {} is assigned more than once", a.pin);
            }
        }
        Ok(Self { assignments })
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PinAssignment> {
        self.assignments.iter()
    }

    /// Every assigned pin, in configuration order.
    pub fn pins(&self) -> Vec<u8> {
        self.assignments.iter().map(|a| a.pin).collect()
    }

    /// All pins assigned to `source` (fan-out lookup). Empty for unassigned
    /// source names.
    pub fn pins_for<'a>(&'a self, source: &'a str) -> impl Iterator<Item = u8> + 'a {
        self.assignments
            .iter()
            .filter(move |a| a.source == source)
            .map(|a| a.pin)
    }

    pub fn contains_source(&self, source: &str) -> bool {
        self.assignments.iter().any(|a| a.source == source)
    }

    /// Distinct source names, in first-appearance order. Used to drive the
    /// per-source state sync after each connect.
    pub fn sources(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.assignments
            .iter()
            .filter(|a| seen.insert(a.source.as_str()))
            .map(|a| a.source.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assign(pin: u8, source: &str) -> PinAssignment {
        PinAssignment { pin, source: source.to_string() }
    }

    // ── PinAssignment parsing ─────────────────────────────────────────────────

    #[test]
    fn parse_simple_assignment() {
        let a: PinAssignment = "11=camera 1".parse().unwrap();
        assert_eq!(a, assign(11, "camera 1"));
    }

    #[test]
    fn parse_keeps_source_verbatim_after_first_equals() {
        // Source names may themselves contain '='.
        let a: PinAssignment = "5=scene=main".parse().unwrap();
        assert_eq!(a, assign(5, "scene=main"));
    }

    #[test]
    fn parse_trims_whitespace_around_pin_only() {
        let a: PinAssignment = " 7 = studio".parse().unwrap();
        assert_eq!(a.pin, 7);
        assert_eq!(a.source, " studio");
    }

    #[test]
    fn parse_pin_zero() {
        let a: PinAssignment = "0=cam".parse().unwrap();
        assert_eq!(a.pin, 0);
    }

    #[test]
    fn parse_rejects_missing_equals() {
        assert!("11".parse::<PinAssignment>().is_err());
    }

    #[test]
    fn parse_rejects_non_numeric_pin() {
        assert!("eleven=cam".parse::<PinAssignment>().is_err());
        assert!("=cam".parse::<PinAssignment>().is_err());
    }

    #[test]
    fn parse_rejects_negative_and_oversized_pins() {
        assert!("-1=cam".parse::<PinAssignment>().is_err());
        assert!("256=cam".parse::<PinAssignment>().is_err());
    }

    #[test]
    fn parse_rejects_pin_above_bcm_range() {
        assert!("28=cam".parse::<PinAssignment>().is_err());
        assert!(format!("{MAX_BCM_PIN}=cam").parse::<PinAssignment>().is_ok());
    }

    #[test]
    fn parse_rejects_empty_source() {
        assert!("11=".parse::<PinAssignment>().is_err());
    }

    // ── AssignmentTable validation ────────────────────────────────────────────

    #[test]
    fn table_accepts_distinct_pins() {
        let t = AssignmentTable::new(vec![assign(11, "camera 1"), assign(12, "camera 2")]).unwrap();
        assert_eq!(t.pins(), vec![11, 12]);
    }

    #[test]
    fn table_rejects_duplicate_pins() {
        let err = AssignmentTable::new(vec![assign(11, "camera 1"), assign(11, "camera 2")])
            .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn table_rejects_out_of_range_pin_from_file() {
        // File-sourced entries bypass FromStr, so the table checks the range too.
        let err = AssignmentTable::new(vec![assign(40, "cam")]).unwrap_err();
        assert!(err.to_string().contains("BCM"));
    }

    #[test]
    fn empty_table_is_valid() {
        let t = AssignmentTable::new(Vec::new()).unwrap();
        assert!(t.is_empty());
        assert!(t.sources().is_empty());
    }

    // ── Lookups ───────────────────────────────────────────────────────────────

    #[test]
    fn pins_for_returns_all_fanned_out_pins() {
        let t = AssignmentTable::new(vec![
            assign(11, "camera 1"),
            assign(12, "camera 2"),
            assign(13, "camera 1"),
        ])
        .unwrap();
        assert_eq!(t.pins_for("camera 1").collect::<Vec<_>>(), vec![11, 13]);
        assert_eq!(t.pins_for("camera 2").collect::<Vec<_>>(), vec![12]);
    }

    #[test]
    fn pins_for_unassigned_source_is_empty() {
        let t = AssignmentTable::new(vec![assign(11, "camera 1")]).unwrap();
        assert_eq!(t.pins_for("camera 9").count(), 0);
    }

    #[test]
    fn source_matching_is_case_sensitive() {
        // OBS source names are matched verbatim.
        let t = AssignmentTable::new(vec![assign(11, "Camera 1")]).unwrap();
        assert!(!t.contains_source("camera 1"));
        assert!(t.contains_source("Camera 1"));
    }

    #[test]
    fn sources_are_deduplicated_in_order() {
        let t = AssignmentTable::new(vec![
            assign(11, "camera 1"),
            assign(12, "camera 2"),
            assign(13, "camera 1"),
        ])
        .unwrap();
        assert_eq!(t.sources(), vec!["camera 1", "camera 2"]);
    }
}
