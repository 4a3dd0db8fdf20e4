//! Cropped face images and exact-pixel matching
//!
//! Matching downscales both images to a fixed square and compares the raw
//! RGBA buffers byte for byte. Any pixel-level difference is a non-match:
//! there is no tolerance for noise, lighting or pose.

use thiserror::Error;

/// Bytes per RGBA pixel
const BYTES_PER_PIXEL: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FaceImageError {
    #[error("image has zero width or height")]
    Empty,
    #[error("pixel buffer is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferSize { width: u32, height: u32, expected: usize, actual: usize },
}

/// Face bounding box in pixel coordinates (right/bottom exclusive)
///
/// Detectors may report boxes that extend past the frame; cropping clamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// An RGBA8 image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl FaceImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, FaceImageError> {
        if width == 0 || height == 0 {
            return Err(FaceImageError::Empty);
        }
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if rgba.len() != expected {
            return Err(FaceImageError::BufferSize { width, height, expected, actual: rgba.len() });
        }
        Ok(Self { width, height, rgba })
    }

    /// Image filled with a single colour
    pub fn solid(width: u32, height: u32, pixel: [u8; 4]) -> Result<Self, FaceImageError> {
        let count = width as usize * height as usize;
        let rgba = pixel.iter().copied().cycle().take(count * BYTES_PER_PIXEL).collect();
        Self::new(width, height, rgba)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_rgba(&self) -> &[u8] {
        &self.rgba
    }

    pub fn into_rgba(self) -> Vec<u8> {
        self.rgba
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let o = self.offset(x, y);
        [self.rgba[o], self.rgba[o + 1], self.rgba[o + 2], self.rgba[o + 3]]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: [u8; 4]) {
        let o = self.offset(x, y);
        self.rgba[o..o + BYTES_PER_PIXEL].copy_from_slice(&pixel);
    }

    /// Cut out a face region, clamping the box to the image bounds
    ///
    /// Returns None when nothing of the box lies inside the image.
    pub fn crop(&self, bbox: FaceBox) -> Option<FaceImage> {
        let left = bbox.left.max(0) as u32;
        let top = bbox.top.max(0) as u32;
        let right = bbox.right.clamp(0, self.width as i32) as u32;
        let bottom = bbox.bottom.clamp(0, self.height as i32) as u32;
        if right <= left || bottom <= top {
            return None;
        }

        let (w, h) = (right - left, bottom - top);
        let mut rgba = Vec::with_capacity(w as usize * h as usize * BYTES_PER_PIXEL);
        for y in top..bottom {
            let start = self.offset(left, y);
            let end = self.offset(right - 1, y) + BYTES_PER_PIXEL;
            rgba.extend_from_slice(&self.rgba[start..end]);
        }
        Some(FaceImage { width: w, height: h, rgba })
    }

    /// Nearest-neighbour resize to a `size`×`size` square (no filtering)
    ///
    /// Each output pixel takes the source pixel under its centre,
    /// `floor((x + 0.5) * w / size)`, the same pick as an unfiltered
    /// Android `createScaledBitmap`.
    pub fn downscale(&self, size: u32) -> FaceImage {
        let size = size.max(1);
        let mut rgba = Vec::with_capacity(size as usize * size as usize * BYTES_PER_PIXEL);
        for y in 0..size {
            let sy = centre_sample(y, self.height, size);
            for x in 0..size {
                let sx = centre_sample(x, self.width, size);
                let o = self.offset(sx, sy);
                rgba.extend_from_slice(&self.rgba[o..o + BYTES_PER_PIXEL]);
            }
        }
        FaceImage { width: size, height: size, rgba }
    }

    /// Exact equality of both images after downscaling to `size`
    pub fn matches(&self, other: &FaceImage, size: u32) -> bool {
        self.downscale(size).rgba == other.downscale(size).rgba
    }
}

/// Source index under the centre of output index `i` when mapping `src` onto `dst`
fn centre_sample(i: u32, src: u32, dst: u32) -> u32 {
    ((2 * i as u64 + 1) * src as u64 / (2 * dst as u64)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> FaceImage {
        let mut img = FaceImage::solid(width, height, [0, 0, 0, 255]).unwrap();
        for y in 0..height {
            for x in 0..width {
                img.set_pixel(x, y, [x as u8, y as u8, (x ^ y) as u8, 255]);
            }
        }
        img
    }

    #[test]
    fn test_new_validates_buffer() {
        assert_eq!(FaceImage::new(0, 4, vec![]), Err(FaceImageError::Empty));
        assert!(matches!(
            FaceImage::new(2, 2, vec![0; 15]),
            Err(FaceImageError::BufferSize { expected: 16, actual: 15, .. })
        ));
        assert!(FaceImage::new(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn test_crop_inside() {
        let img = gradient(10, 10);
        let face = img.crop(FaceBox { left: 2, top: 3, right: 6, bottom: 8 }).unwrap();
        assert_eq!((face.width(), face.height()), (4, 5));
        assert_eq!(face.pixel(0, 0), img.pixel(2, 3));
        assert_eq!(face.pixel(3, 4), img.pixel(5, 7));
    }

    #[test]
    fn test_crop_clamps_to_bounds() {
        let img = gradient(10, 10);
        let face = img.crop(FaceBox { left: -5, top: -5, right: 20, bottom: 4 }).unwrap();
        assert_eq!((face.width(), face.height()), (10, 4));
        assert_eq!(face.pixel(0, 0), img.pixel(0, 0));
    }

    #[test]
    fn test_crop_outside_is_none() {
        let img = gradient(10, 10);
        assert!(img.crop(FaceBox { left: 12, top: 0, right: 20, bottom: 5 }).is_none());
        assert!(img.crop(FaceBox { left: 4, top: 4, right: 4, bottom: 8 }).is_none());
    }

    #[test]
    fn test_downscale_nearest() {
        let img = gradient(128, 128);
        let small = img.downscale(64);
        assert_eq!((small.width(), small.height()), (64, 64));
        assert_eq!(small.pixel(1, 1), img.pixel(3, 3));
        assert_eq!(small.pixel(63, 63), img.pixel(127, 127));
    }

    #[test]
    fn test_downscale_samples_pixel_centres() {
        // 3 -> 2: output centres fall at 0.75 and 2.25
        let img = gradient(3, 3);
        let small = img.downscale(2);
        assert_eq!(small.pixel(0, 0), img.pixel(0, 0));
        assert_eq!(small.pixel(1, 0), img.pixel(2, 0));
        assert_eq!(small.pixel(1, 1), img.pixel(2, 2));
    }

    #[test]
    fn test_downscale_upsamples_small_images() {
        let img = gradient(2, 2);
        let big = img.downscale(4);
        assert_eq!(big.pixel(0, 0), img.pixel(0, 0));
        assert_eq!(big.pixel(1, 1), img.pixel(0, 0));
        assert_eq!(big.pixel(3, 3), img.pixel(1, 1));
    }

    #[test]
    fn test_identical_images_match() {
        let a = gradient(100, 80);
        let b = gradient(100, 80);
        assert!(a.matches(&b, 64));
    }

    #[test]
    fn test_single_pixel_difference_no_match() {
        let a = gradient(64, 64);
        let mut b = a.clone();
        b.set_pixel(10, 20, [1, 2, 3, 4]);
        assert!(!a.matches(&b, 64));
    }

    #[test]
    fn test_difference_dropped_by_downscale_still_matches() {
        // Even columns are never sampled when halving the width
        let a = gradient(128, 128);
        let mut b = a.clone();
        b.set_pixel(0, 1, [9, 9, 9, 9]);
        assert!(a.matches(&b, 64));
    }
}
