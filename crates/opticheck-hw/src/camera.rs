//! V4L2 camera capture via the `v4l` crate.
//!
//! A [`Camera`] owns the device and its mmap stream for the duration of one
//! capture attempt. Dropping it releases the device, so every exit path of a
//! capture loop gives the device back.

use crate::frame::{self, Frame, PixelFormat};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

const STREAM_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy: {0}")]
    DeviceBusy(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("unsupported pixel format {0} (need YUYV, MJPG or RGB3)")]
    UnsupportedFormat(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
}

/// Source of live frames. One failed read is transient; callers decide
/// whether to keep reading.
pub trait FrameSource {
    fn read_frame(&mut self) -> Result<Frame, CameraError>;
}

/// Something that can be opened into a [`FrameSource`].
///
/// The returned source holds the device until it is dropped.
pub trait CaptureDevice {
    type Source: FrameSource;

    fn open(&self) -> Result<Self::Source, CameraError>;

    /// Human-readable name for logs.
    fn describe(&self) -> String;
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// A V4L2 device addressed by index (`/dev/video{index}`).
#[derive(Debug, Clone, Copy)]
pub struct V4lDevice {
    pub index: usize,
}

impl V4lDevice {
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    pub fn path(&self) -> String {
        format!("/dev/video{}", self.index)
    }
}

impl CaptureDevice for V4lDevice {
    type Source = Camera;

    fn open(&self) -> Result<Camera, CameraError> {
        Camera::open(&self.path())
    }

    fn describe(&self) -> String {
        self.path()
    }
}

/// Open V4L2 camera with a running mmap stream.
pub struct Camera {
    // Declared before `device` so the stream is torn down first.
    stream: MmapStream<'static>,
    #[allow(dead_code)]
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub pixel_format: PixelFormat,
}

impl Camera {
    /// Open a V4L2 camera device by path and start streaming with the
    /// driver's default format.
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy(device_path.to_string())
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device
            .query_caps()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to query capabilities: {e}")))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        let format = device
            .format()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to get format: {e}")))?;
        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr)
            .ok_or_else(|| CameraError::UnsupportedFormat(format!("{:?}", format.fourcc)))?;

        let stream = MmapStream::with_buffers(&device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))?;

        tracing::info!(
            device = device_path,
            card = %caps.card,
            width = format.width,
            height = format.height,
            ?pixel_format,
            "camera opened"
        );

        Ok(Self {
            stream,
            device,
            width: format.width,
            height: format.height,
            device_path: device_path.to_string(),
            pixel_format,
        })
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        (0..16)
            .filter_map(|i| {
                let path = format!("/dev/video{i}");
                if !Path::new(&path).exists() {
                    return None;
                }
                let dev = Device::with_path(&path).ok()?;
                let caps = dev.query_caps().ok()?;
                if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                    return None;
                }
                Some(DeviceInfo {
                    path,
                    name: caps.card.clone(),
                    driver: caps.driver.clone(),
                    bus: caps.bus.clone(),
                })
            })
            .collect()
    }
}

impl FrameSource for Camera {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        let (width, height, pixel_format) = (self.width, self.height, self.pixel_format);

        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

        let used = (meta.bytesused as usize).min(buf.len());
        let payload = if used > 0 { &buf[..used] } else { buf };
        let image = frame::decode(pixel_format, payload, width, height)
            .map_err(|e| CameraError::CaptureFailed(format!("frame decode failed: {e}")))?;

        Ok(Frame {
            image,
            timestamp: std::time::Instant::now(),
            sequence: meta.sequence,
        })
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        tracing::debug!(device = %self.device_path, "camera released");
    }
}
