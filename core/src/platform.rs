//! Host-emulation platform configuration.
//!
//! All platform wiring comes from environment variables so the same
//! binary can be pointed at different flash images, entropy devices
//! and button inputs. Invalid values are setup errors; setup errors
//! terminate the process with exit code 1 before any request is read.

use std::env;
use std::fmt;
use std::io;

/// Path of the flash emulation file.
pub const ENV_FLASH_FILE: &str = "COLDCORE_FLASH_FILE";
pub const DEFAULT_FLASH_FILE: &str = "emulator.img";

/// Path of the entropy character device.
pub const ENV_RANDOM_DEV: &str = "COLDCORE_RANDOM_DEV";
pub const DEFAULT_RANDOM_DEV: &str = "/dev/urandom";

/// BCM pin numbers for the confirm/reject buttons.
pub const ENV_GPIO_YES: &str = "COLDCORE_GPIO_YES";
pub const ENV_GPIO_NO: &str = "COLDCORE_GPIO_NO";
pub const DEFAULT_GPIO_YES: u8 = 16;
pub const DEFAULT_GPIO_NO: u8 = 12;

/// Optional FIFO carrying scripted button lines instead of GPIO.
pub const ENV_BUTTON_FIFO: &str = "COLDCORE_BUTTON_FIFO";

const GPIO_PIN_MIN: u8 = 1;
const GPIO_PIN_MAX: u8 = 27;

/// Fatal error during process startup.
#[derive(Debug)]
pub enum SetupError {
    Entropy { path: String, source: io::Error },
    Flash { path: String, source: io::Error },
    Buttons { path: String, source: io::Error },
    InvalidButtonPin { var: &'static str, value: String },
    Storage,
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::Entropy { path, source } => {
                write!(f, "cannot open entropy device {path}: {source}")
            }
            SetupError::Flash { path, source } => {
                write!(f, "cannot open flash file {path}: {source}")
            }
            SetupError::Buttons { path, source } => {
                write!(f, "cannot open button input {path}: {source}")
            }
            SetupError::InvalidButtonPin { var, value } => {
                write!(
                    f,
                    "{var}={value} is not a GPIO pin in [{GPIO_PIN_MIN},{GPIO_PIN_MAX}]"
                )
            }
            SetupError::Storage => write!(f, "stored configuration is unreadable"),
        }
    }
}

fn env_or(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_owned())
}

/// Path of the flash emulation file.
pub fn flash_file() -> String {
    env_or(ENV_FLASH_FILE, DEFAULT_FLASH_FILE)
}

/// Path of the entropy device.
pub fn random_dev() -> String {
    env_or(ENV_RANDOM_DEV, DEFAULT_RANDOM_DEV)
}

/// Path of the button FIFO, if configured.
pub fn button_fifo() -> Option<String> {
    env::var(ENV_BUTTON_FIFO).ok()
}

fn button_pin(var: &'static str, default: u8) -> Result<u8, SetupError> {
    let value = match env::var(var) {
        Ok(v) => v,
        Err(_) => return Ok(default),
    };
    match value.trim().parse::<u8>() {
        Ok(pin) if (GPIO_PIN_MIN..=GPIO_PIN_MAX).contains(&pin) => Ok(pin),
        _ => Err(SetupError::InvalidButtonPin { var, value }),
    }
}

/// Validated button pin assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonConfig {
    pub gpio_yes: u8,
    pub gpio_no: u8,
}

impl ButtonConfig {
    /// Reads and validates both pins. Must run before any secret is
    /// touched so a misconfiguration cannot leave the device in a
    /// half-initialized state.
    pub fn from_env() -> Result<Self, SetupError> {
        Ok(Self {
            gpio_yes: button_pin(ENV_GPIO_YES, DEFAULT_GPIO_YES)?,
            gpio_no: button_pin(ENV_GPIO_NO, DEFAULT_GPIO_NO)?,
        })
    }
}
