//! Device selection.
//!
//! Every [`Variable`](crate::variable::Variable) is tagged with the device it
//! lives on. Buffers are always kept in host memory; the tag records where
//! the optimizer placed a tensor so that [`Variable::cpu`] can tell a host
//! transfer from a no-op.
//!
//! New variables take the process-wide default device, which starts out as
//! [`Device::Cpu`] and can be changed with [`set_default_device`] or read
//! from the `FEATUREVIS_DEVICE` environment variable with
//! [`Device::from_env`].
//!
//! [`Variable::cpu`]: crate::variable::Variable::cpu

use core::fmt;
use core::str::FromStr;
use core::sync::atomic::{AtomicU8, Ordering};

use crate::error::Error;

/// Environment variable consulted by [`Device::from_env`].
pub const DEVICE_ENV_VAR: &str = "FEATUREVIS_DEVICE";

/// Devices a tensor can be placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Device {
    /// Host memory (default).
    #[default]
    Cpu = 0,
    /// A `wgpu` adapter.
    Wgpu,
    /// A CUDA device.
    Cuda,
}

impl Device {
    /// Lowercase name, as accepted by [`FromStr`].
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Wgpu => "wgpu",
            Self::Cuda => "cuda",
        }
    }

    /// Reads the device from `FEATUREVIS_DEVICE`.
    ///
    /// Falls back to [`default_device`] when the variable is unset or does
    /// not name a device.
    pub fn from_env() -> Self {
        match std::env::var(DEVICE_ENV_VAR) {
            Ok(value) => value.parse().unwrap_or_else(|err| {
                log::warn!("ignoring {DEVICE_ENV_VAR}: {err}");
                default_device()
            }),
            Err(_) => default_device(),
        }
    }
}

impl TryFrom<u8> for Device {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Cpu),
            1 => Ok(Self::Wgpu),
            2 => Ok(Self::Cuda),
            _ => Err(()),
        }
    }
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "wgpu" => Ok(Self::Wgpu),
            "cuda" => Ok(Self::Cuda),
            _ => Err(Error::UnknownDevice(s.to_owned())),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Internal global state for the default device.
static GLOBAL_DEFAULT_DEVICE: AtomicU8 = AtomicU8::new(Device::Cpu as u8);

/// Sets the device new variables are placed on.
///
/// # Example
///
/// ```
/// use featurevis::device::{default_device, set_default_device, Device};
/// set_default_device(Device::Cpu);
/// assert_eq!(default_device(), Device::Cpu);
/// ```
pub fn set_default_device(device: Device) {
    log::debug!("default device set to {device}");
    GLOBAL_DEFAULT_DEVICE.store(device as u8, Ordering::Release);
}

/// Returns the device new variables are placed on.
///
/// If the stored value is invalid, defaults to [`Device::Cpu`].
pub fn default_device() -> Device {
    Device::try_from(GLOBAL_DEFAULT_DEVICE.load(Ordering::Acquire)).unwrap_or_default()
}
