//! Slide preparation and raw frame conversion.

use image::imageops::FilterType;
use image::RgbImage;
use std::path::Path;

use crate::error::{MediaError, MediaResult};

/// A planar YUV 4:2:0 frame: full-size Y plane, then quarter-size U and V.
#[derive(Debug, Clone, PartialEq)]
pub struct I420Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl I420Frame {
    pub fn chroma_width(&self) -> usize {
        (self.width as usize + 1) / 2
    }

    pub fn chroma_height(&self) -> usize {
        (self.height as usize + 1) / 2
    }

    pub fn y_plane(&self) -> &[u8] {
        &self.data[..self.width as usize * self.height as usize]
    }

    pub fn u_plane(&self) -> &[u8] {
        let y = self.width as usize * self.height as usize;
        &self.data[y..y + self.chroma_width() * self.chroma_height()]
    }

    pub fn v_plane(&self) -> &[u8] {
        let y = self.width as usize * self.height as usize;
        let c = self.chroma_width() * self.chroma_height();
        &self.data[y + c..]
    }
}

/// Load a photo and fit it to the output size.
///
/// Large sources are first reduced to at most twice the target so the
/// final filtered resize works on a small image.
pub fn prepare_slide(path: &Path, width: u32, height: u32) -> MediaResult<RgbImage> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let img = image::open(path).map_err(|e| MediaError::ImageLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let img = if img.width() > width * 2 || img.height() > height * 2 {
        img.thumbnail(width * 2, height * 2)
    } else {
        img
    };

    Ok(img.resize_to_fill(width, height, FilterType::Triangle).to_rgb8())
}

fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Convert RGB to I420 with BT.601 integer coefficients.
///
/// Chroma is sampled from the top-left pixel of each 2x2 block.
pub fn rgb_to_i420(img: &RgbImage) -> I420Frame {
    let (width, height) = img.dimensions();
    let (w, h) = (width as usize, height as usize);
    let (cw, ch) = ((w + 1) / 2, (h + 1) / 2);

    let mut data = vec![0u8; w * h + 2 * cw * ch];
    let (y_plane, chroma) = data.split_at_mut(w * h);
    let (u_plane, v_plane) = chroma.split_at_mut(cw * ch);

    for (x, y, pixel) in img.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let (r, g, b) = (r as i32, g as i32, b as i32);

        y_plane[y as usize * w + x as usize] = clamp_u8(((66 * r + 129 * g + 25 * b + 128) >> 8) + 16);

        if x % 2 == 0 && y % 2 == 0 {
            let idx = (y as usize / 2) * cw + x as usize / 2;
            u_plane[idx] = clamp_u8(((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128);
            v_plane[idx] = clamp_u8(((112 * r - 94 * g - 18 * b + 128) >> 8) + 128);
        }
    }

    I420Frame { width, height, data }
}

/// Presentation timestamps in microseconds for a constant frame rate.
#[derive(Debug, Clone)]
pub struct PtsClock {
    frame_duration_micros: i64,
    next: i64,
    last: Option<i64>,
}

impl PtsClock {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            frame_duration_micros: 1_000_000 / frame_rate.max(1) as i64,
            next: 0,
            last: None,
        }
    }

    pub fn frame_duration_micros(&self) -> i64 {
        self.frame_duration_micros
    }

    /// Timestamp for the next frame.
    pub fn tick(&mut self) -> MediaResult<i64> {
        let pts = self.next;
        if let Some(previous) = self.last {
            if pts <= previous {
                return Err(MediaError::NonMonotonicPts { previous, next: pts });
            }
        }
        self.last = Some(pts);
        self.next += self.frame_duration_micros;
        Ok(pts)
    }

    /// Total duration covered by the frames ticked so far.
    pub fn elapsed_micros(&self) -> i64 {
        self.next
    }
}
