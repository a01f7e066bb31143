//! Camera capture
//!
//! [`FrameSource`] is the contract the call controller drives;
//! [`CameraSource`] implements it over any [`CaptureDevice`] with a
//! dedicated capture thread and an exclusive consumer binding.

pub mod device;
pub mod frame;
pub mod source;

pub use device::{CaptureDevice, SyntheticCamera};
pub use frame::{CaptureFormat, Orientation, PixelFormat, RawFrame};
pub use source::{CameraSource, FrameConsumer, FrameSource};
