//! The tally bridge: maps source active-state changes onto pin levels.
//!
//! The bridge owns the assignment table, the pin controller, and the latched
//! state in between: the last reported active state per assigned source and
//! the last level actually driven per pin. Re-applying an unchanged state is
//! a no-op at the hardware level, so replayed sync responses and duplicate
//! events cost nothing.

use std::collections::HashMap;

use crate::assign::AssignmentTable;
use crate::gpio::PinController;

pub struct Bridge {
    table: AssignmentTable,
    pins: PinController,
    /// Last known active state per assigned source name.
    source_active: HashMap<String, bool>,
    /// Last level successfully driven per pin.
    driven: HashMap<u8, bool>,
}

impl Bridge {
    /// Wraps a validated table and an opened controller. The controller has
    /// already driven every claimed pin low; the latched state starts out
    /// matching that.
    pub fn new(table: AssignmentTable, pins: PinController) -> Self {
        let source_active = table.sources().into_iter().map(|s| (s, false)).collect();
        let driven = table.pins().into_iter().map(|p| (p, false)).collect();
        Self { table, pins, source_active, driven }
    }

    /// Applies one source state report. Unassigned sources are ignored
    /// without error; assigned ones update every fanned-out pin whose level
    /// actually changes.
    pub fn apply(&mut self, source: &str, active: bool) {
        if !self.table.contains_source(source) {
            tracing::debug!(source, "ignoring unassigned source");
            return;
        }
        tracing::debug!(source, active, "source state changed");
        self.source_active.insert(source.to_string(), active);
        self.update_pins();
    }

    /// Drives every pin low and forgets all reported state. Used when the
    /// connection drops (the next sync rebuilds the truth) and at shutdown.
    pub fn clear_all(&mut self) {
        for state in self.source_active.values_mut() {
            *state = false;
        }
        self.update_pins();
    }

    /// Recomputes the level of every assigned pin from the latched source
    /// states and writes out the differences. A failed write is logged and
    /// left undriven so the next event retries it.
    fn update_pins(&mut self) {
        for assignment in self.table.iter() {
            let level = self.source_active[&assignment.source];
            if self.driven.get(&assignment.pin) == Some(&level) {
                continue;
            }
            match self.pins.set(assignment.pin, level) {
                Ok(()) => {
                    self.driven.insert(assignment.pin, level);
                }
                Err(e) => {
                    tracing::warn!(pin = assignment.pin, error = %e, "pin write failed");
                }
            }
        }
    }
}
