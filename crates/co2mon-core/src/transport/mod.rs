//! Transport layer module.

#[cfg(target_os = "linux")]
pub mod hidraw;
pub mod mock;
pub mod traits;

#[cfg(target_os = "linux")]
pub use hidraw::{HidrawAccess, HidrawHandle};
pub use mock::{MockAccess, MockCall, MockHandle, MockReply};
pub use traits::{DeviceAccess, ErrorClass, TransportError};
