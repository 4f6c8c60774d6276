//! Tally light output via the Raspberry Pi GPIO header.
//!
//! On Linux the assigned pins are claimed as outputs through `rppal` and
//! driven low at startup. When the GPIO chip cannot be opened (not a Pi,
//! missing `/dev/gpiomem` permissions) the controller falls back to a
//! logging dummy backend so the daemon stays usable for dry runs against a
//! live OBS. On non-Linux hosts only the dummy backend is compiled.

use std::collections::HashMap;

use anyhow::{bail, Result};

/// Owns every assigned output pin for the lifetime of the process.
pub struct PinController {
    backend: Backend,
}

enum Backend {
    #[cfg(target_os = "linux")]
    Gpio(imp::Pins),
    Dummy(DummyPins),
}

impl PinController {
    /// Claims each pin in `pins` as an output and drives it low.
    ///
    /// Never fails: a GPIO chip that cannot be opened demotes the controller
    /// to the dummy backend with a warning.
    pub fn open(pins: &[u8]) -> Self {
        #[cfg(target_os = "linux")]
        match imp::Pins::claim(pins) {
            Ok(claimed) => {
                tracing::info!(pins = ?pins, "claimed GPIO outputs");
                return Self { backend: Backend::Gpio(claimed) };
            }
            Err(e) => {
                tracing::warn!(error = %e, "GPIO unavailable, using dummy backend");
            }
        }

        tracing::info!(pins = ?pins, "dummy GPIO backend active, writes will only be logged");
        Self { backend: Backend::Dummy(DummyPins::claim(pins)) }
    }

    /// Drives `pin` high or low. Fails only for a pin that was never
    /// claimed; callers treat failures as non-fatal.
    pub fn set(&mut self, pin: u8, on: bool) -> Result<()> {
        match &mut self.backend {
            #[cfg(target_os = "linux")]
            Backend::Gpio(pins) => pins.set(pin, on),
            Backend::Dummy(pins) => pins.set(pin, on),
        }
    }

    #[cfg(test)]
    pub(crate) fn dummy(pins: &[u8]) -> Self {
        Self { backend: Backend::Dummy(DummyPins::claim(pins)) }
    }

    /// Current level of every claimed pin (dummy backend only).
    #[cfg(test)]
    pub(crate) fn dummy_levels(&self) -> &HashMap<u8, bool> {
        match &self.backend {
            Backend::Dummy(pins) => &pins.levels,
            #[cfg(target_os = "linux")]
            Backend::Gpio(_) => panic!("dummy_levels on a real GPIO backend"),
        }
    }

    /// Number of writes issued so far (dummy backend only).
    #[cfg(test)]
    pub(crate) fn dummy_writes(&self) -> u64 {
        match &self.backend {
            Backend::Dummy(pins) => pins.writes,
            #[cfg(target_os = "linux")]
            Backend::Gpio(_) => panic!("dummy_writes on a real GPIO backend"),
        }
    }
}

// ── Dummy backend ─────────────────────────────────────────────────────────────

/// Stand-in backend that logs writes instead of driving hardware.
struct DummyPins {
    levels: HashMap<u8, bool>,
    writes: u64,
}

impl DummyPins {
    fn claim(pins: &[u8]) -> Self {
        Self {
            levels: pins.iter().map(|&p| (p, false)).collect(),
            writes: 0,
        }
    }

    fn set(&mut self, pin: u8, on: bool) -> Result<()> {
        let Some(level) = self.levels.get_mut(&pin) else {
            bail!("pin {pin} was never claimed");
        };
        *level = on;
        self.writes += 1;
        tracing::debug!(pin, on, "gpio write (dummy)");
        Ok(())
    }
}

// ── rppal backend ─────────────────────────────────────────────────────────────

#[cfg(target_os = "linux")]
mod imp {
    use std::collections::HashMap;

    use anyhow::{bail, Context, Result};
    use rppal::gpio::{Gpio, OutputPin};

    pub(super) struct Pins {
        outputs: HashMap<u8, OutputPin>,
    }

    impl Pins {
        /// Opens the GPIO chip and claims each pin as an output, initially
        /// low. rppal resets the pins to inputs when they are dropped, which
        /// also turns the lights off on exit.
        pub fn claim(pins: &[u8]) -> Result<Self> {
            let gpio = Gpio::new().context("opening GPIO chip")?;
            let mut outputs = HashMap::new();
            for &pin in pins {
                let output = gpio
                    .get(pin)
                    .with_context(|| format!("claiming GPIO {pin}"))?
                    .into_output_low();
                outputs.insert(pin, output);
            }
            Ok(Self { outputs })
        }

        pub fn set(&mut self, pin: u8, on: bool) -> Result<()> {
            let Some(output) = self.outputs.get_mut(&pin) else {
                bail!("pin {pin} was never claimed");
            };
            if on {
                output.set_high();
            } else {
                output.set_low();
            }
            Ok(())
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claimed_pins_start_low() {
        let pins = PinController::dummy(&[11, 12]);
        assert!(!pins.dummy_levels()[&11]);
        assert!(!pins.dummy_levels()[&12]);
        assert_eq!(pins.dummy_writes(), 0);
    }

    #[test]
    fn set_drives_only_the_named_pin() {
        let mut pins = PinController::dummy(&[11, 12]);
        pins.set(11, true).unwrap();
        assert!(pins.dummy_levels()[&11]);
        assert!(!pins.dummy_levels()[&12]);
        assert_eq!(pins.dummy_writes(), 1);
    }

    #[test]
    fn set_can_lower_a_pin_again() {
        let mut pins = PinController::dummy(&[4]);
        pins.set(4, true).unwrap();
        pins.set(4, false).unwrap();
        assert!(!pins.dummy_levels()[&4]);
        assert_eq!(pins.dummy_writes(), 2);
    }

    #[test]
    fn set_unclaimed_pin_fails() {
        let mut pins = PinController::dummy(&[11]);
        let err = pins.set(12, true).unwrap_err();
        assert!(err.to_string().contains("never claimed"));
        assert_eq!(pins.dummy_writes(), 0);
    }
}
