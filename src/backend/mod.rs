#[cfg(feature = "hardware-gpio")]
pub mod libgpiod;
pub mod mock;

#[cfg(feature = "hardware-gpio")]
pub use libgpiod::LibgpiodBackend;
pub use mock::MockGpioBackend;

use crate::error::AppError;

#[cfg(feature = "hardware-gpio")]
pub type DefaultBackend = LibgpiodBackend;
#[cfg(not(feature = "hardware-gpio"))]
pub type DefaultBackend = MockGpioBackend;

/// Character-device backend when built with `hardware-gpio`, in-memory lines
/// otherwise.
pub fn default_backend() -> Result<DefaultBackend, AppError> {
    #[cfg(feature = "hardware-gpio")]
    {
        LibgpiodBackend::new()
    }
    #[cfg(not(feature = "hardware-gpio"))]
    {
        Ok(MockGpioBackend::default())
    }
}
