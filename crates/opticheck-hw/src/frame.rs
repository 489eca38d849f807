//! Frame type and pixel-format decoding (YUYV, MJPG and RGB3 to RGB).

use image::{ImageFormat, RgbImage};

/// A captured RGB camera frame.
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Pixel format reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed, 2 bytes/pixel.
    Yuyv,
    /// Motion-JPEG, one JPEG image per buffer.
    Mjpg,
    /// Packed 24-bit RGB.
    Rgb3,
}

impl PixelFormat {
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"YUYV" => Some(Self::Yuyv),
            b"MJPG" => Some(Self::Mjpg),
            b"RGB3" => Some(Self::Rgb3),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("jpeg decode failed: {0}")]
    Jpeg(#[from] image::ImageError),
}

/// Decode one raw driver buffer into an RGB image.
pub fn decode(format: PixelFormat, buf: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    match format {
        PixelFormat::Yuyv => yuyv_to_rgb(buf, width, height),
        PixelFormat::Mjpg => Ok(image::load_from_memory_with_format(buf, ImageFormat::Jpeg)?.to_rgb8()),
        PixelFormat::Rgb3 => {
            let expected = (width * height * 3) as usize;
            if buf.len() < expected {
                return Err(FrameError::InvalidLength { expected, actual: buf.len() });
            }
            RgbImage::from_raw(width, height, buf[..expected].to_vec())
                .ok_or(FrameError::InvalidLength { expected, actual: buf.len() })
        }
    }
}

/// Convert packed YUYV (4:2:2) to RGB using BT.601 studio-swing coefficients.
///
/// Each 4-byte group `[Y0, U, Y1, V]` encodes two horizontally adjacent pixels
/// sharing the same chroma.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let pixels = (width * height) as usize;
    let expected = pixels * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength { expected, actual: yuyv.len() });
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for group in yuyv[..expected].chunks_exact(4) {
        let (u, v) = (group[1], group[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(group[0], u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(group[2], u, v));
    }

    RgbImage::from_raw(width, height, rgb).ok_or(FrameError::InvalidLength {
        expected,
        actual: yuyv.len(),
    })
}

fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::io::Cursor;

    #[test]
    fn test_yuyv_black_and_white() {
        // 2x1 image: Y0=16 (black), Y1=235 (white), neutral chroma
        let yuyv = vec![16, 128, 235, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_yuyv_chroma_shifts_channels() {
        // Strong V (red-difference) pushes red above blue.
        let yuyv = vec![128, 128, 128, 240];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        let [r, _, b] = rgb.get_pixel(0, 0).0;
        assert!(r > b, "r={r} b={b}");
    }

    #[test]
    fn test_yuyv_4x2_dimensions() {
        let yuyv = vec![128u8; 16];
        let rgb = yuyv_to_rgb(&yuyv, 4, 2).unwrap();
        assert_eq!(rgb.dimensions(), (4, 2));
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let result = yuyv_to_rgb(&[100, 128], 2, 1);
        assert!(matches!(result, Err(FrameError::InvalidLength { expected: 4, actual: 2 })));
    }

    #[test]
    fn test_decode_rgb3() {
        let buf = vec![1, 2, 3, 4, 5, 6];
        let rgb = decode(PixelFormat::Rgb3, &buf, 2, 1).unwrap();
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([4, 5, 6]));
        assert!(decode(PixelFormat::Rgb3, &buf[..4], 2, 1).is_err());
    }

    #[test]
    fn test_decode_mjpg() {
        let src = RgbImage::from_pixel(16, 8, Rgb([200, 200, 200]));
        let mut jpeg = Cursor::new(Vec::new());
        src.write_to(&mut jpeg, ImageFormat::Jpeg).unwrap();

        let rgb = decode(PixelFormat::Mjpg, jpeg.get_ref(), 16, 8).unwrap();
        assert_eq!(rgb.dimensions(), (16, 8));
        assert!(decode(PixelFormat::Mjpg, b"garbage", 16, 8).is_err());
    }

    #[test]
    fn test_pixel_format_from_fourcc() {
        assert_eq!(PixelFormat::from_fourcc(b"YUYV"), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(b"MJPG"), Some(PixelFormat::Mjpg));
        assert_eq!(PixelFormat::from_fourcc(b"GREY"), None);
    }
}
