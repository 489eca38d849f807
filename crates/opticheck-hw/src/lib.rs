//! opticheck-hw — Hardware abstraction for camera capture.
//!
//! Provides V4L2-based camera access by device index and decoding of the
//! driver's default pixel format into RGB frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CaptureDevice, DeviceInfo, FrameSource, V4lDevice};
pub use frame::{Frame, FrameError, PixelFormat};
