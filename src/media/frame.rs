//! Raw frame primitives
//!
//! Decoded camera and screen frames are plain RGB8 buffers. [`RawFrame`] is
//! immutable and cheap to clone (`Bytes` reference counting); [`Canvas`] is
//! the mutable surface the compositor assembles output on before freezing
//! it back into a frame.

use bytes::Bytes;

use crate::error::{Error, Result};

/// Bytes per pixel (RGB8)
pub const BYTES_PER_PIXEL: usize = 3;

/// Upper bound on either frame dimension; anything larger is rejected at
/// the decode boundary before it can drive an absurd allocation.
pub const MAX_DIMENSION: u32 = 4096;

/// An immutable decoded RGB8 frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    width: u32,
    height: u32,
    pixels: Bytes,
}

impl RawFrame {
    /// Build a frame from raw pixels, validating dimensions against the
    /// buffer length.
    pub fn new(width: u32, height: u32, pixels: Bytes) -> Result<Self> {
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(Error::BadFrame(format!(
                "unsupported dimensions {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(Error::BadFrame(format!(
                "{}x{} frame needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(RawFrame {
            width,
            height,
            pixels,
        })
    }

    /// Uniform-color frame
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Canvas::solid(width, height, rgb).freeze()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &Bytes {
        &self.pixels
    }

    /// Nearest-neighbor resize. Dimensions are clamped to at least 1.
    pub fn resize(&self, new_width: u32, new_height: u32) -> RawFrame {
        let new_width = new_width.max(1);
        let new_height = new_height.max(1);
        if new_width == self.width && new_height == self.height {
            return self.clone();
        }

        let mut out =
            Vec::with_capacity(new_width as usize * new_height as usize * BYTES_PER_PIXEL);
        for y in 0..new_height {
            let src_y = (y as u64 * self.height as u64 / new_height as u64) as usize;
            let row = src_y * self.width as usize * BYTES_PER_PIXEL;
            for x in 0..new_width {
                let src_x = (x as u64 * self.width as u64 / new_width as u64) as usize;
                let idx = row + src_x * BYTES_PER_PIXEL;
                out.extend_from_slice(&self.pixels[idx..idx + BYTES_PER_PIXEL]);
            }
        }

        RawFrame {
            width: new_width,
            height: new_height,
            pixels: Bytes::from(out),
        }
    }

    /// Pixel at `(x, y)`, for assertions in tests and layout checks
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        Some([self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]])
    }
}

/// Mutable RGB8 surface for composing output frames
#[derive(Debug)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    /// Uniform-color canvas
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut pixels = Vec::with_capacity(width as usize * height as usize * BYTES_PER_PIXEL);
        for _ in 0..(width as usize * height as usize) {
            pixels.extend_from_slice(&rgb);
        }
        Canvas {
            width,
            height,
            pixels,
        }
    }

    /// Canvas seeded from a frame resized to the requested dimensions
    pub fn from_frame(frame: &RawFrame, width: u32, height: u32) -> Self {
        let resized = frame.resize(width, height);
        Canvas {
            width: resized.width,
            height: resized.height,
            pixels: resized.pixels.to_vec(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Paste `frame` with its top-left corner at `(x, y)`, clipping
    /// whatever falls outside the canvas.
    pub fn blit(&mut self, frame: &RawFrame, x: u32, y: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let copy_width = frame.width.min(self.width - x) as usize;
        let copy_height = frame.height.min(self.height - y) as usize;

        for row in 0..copy_height {
            let src = row * frame.width as usize * BYTES_PER_PIXEL;
            let dst = ((y as usize + row) * self.width as usize + x as usize) * BYTES_PER_PIXEL;
            let len = copy_width * BYTES_PER_PIXEL;
            self.pixels[dst..dst + len].copy_from_slice(&frame.pixels[src..src + len]);
        }
    }

    /// Finish composing and hand the surface back as an immutable frame
    pub fn freeze(self) -> RawFrame {
        RawFrame {
            width: self.width,
            height: self.height,
            pixels: Bytes::from(self.pixels),
        }
    }
}
