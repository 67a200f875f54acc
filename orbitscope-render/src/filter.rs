use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::buffer::RenderBuffer;

/// A post-processing step applied to the colorized raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    /// 3×3 box blur.
    Blur,
    Sharpen,
    /// Laplacian edge detection.
    EdgeDetect,
    /// Quantize each channel to `levels` values.
    Posterize { levels: u8 },
    Invert,
}

const BLUR: [[i32; 3]; 3] = [[1, 1, 1], [1, 1, 1], [1, 1, 1]];
const SHARPEN: [[i32; 3]; 3] = [[0, -1, 0], [-1, 5, -1], [0, -1, 0]];
const EDGE: [[i32; 3]; 3] = [[-1, -1, -1], [-1, 8, -1], [-1, -1, -1]];

impl Filter {
    pub fn apply(&self, buf: &mut RenderBuffer) {
        match *self {
            Self::Blur => convolve(buf, &BLUR, 9),
            Self::Sharpen => convolve(buf, &SHARPEN, 1),
            Self::EdgeDetect => convolve(buf, &EDGE, 1),
            Self::Posterize { levels } => posterize(buf, levels),
            Self::Invert => map_channels(buf, |v| 255 - v),
        }
    }
}

/// Apply `filters` in order.
pub fn apply_chain(filters: &[Filter], buf: &mut RenderBuffer) {
    for f in filters {
        f.apply(buf);
    }
}

/// Per-channel map over RGB, leaving alpha untouched.
fn map_channels(buf: &mut RenderBuffer, f: impl Fn(u8) -> u8 + Sync) {
    buf.pixels.par_chunks_mut(4).for_each(|px| {
        px[0] = f(px[0]);
        px[1] = f(px[1]);
        px[2] = f(px[2]);
    });
}

fn posterize(buf: &mut RenderBuffer, levels: u8) {
    if levels < 2 {
        map_channels(buf, |_| 0);
        return;
    }
    let steps = (levels - 1) as f64;
    map_channels(buf, |v| {
        let q = (v as f64 / 255.0 * steps).round() / steps;
        (q * 255.0).round() as u8
    });
}

/// 3×3 convolution over RGB with clamped edges.
fn convolve(buf: &mut RenderBuffer, kernel: &[[i32; 3]; 3], divisor: i32) {
    let w = buf.width as i64;
    let h = buf.height as i64;
    if w == 0 || h == 0 {
        return;
    }
    let src = buf.pixels.clone();
    let stride = buf.stride();
    buf.pixels
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as i64;
            for x in 0..w {
                let mut acc = [0i32; 3];
                for (ky, krow) in kernel.iter().enumerate() {
                    let sy = (y + ky as i64 - 1).clamp(0, h - 1);
                    for (kx, &k) in krow.iter().enumerate() {
                        let sx = (x + kx as i64 - 1).clamp(0, w - 1);
                        let i = (sy * w + sx) as usize * 4;
                        for (c, a) in acc.iter_mut().enumerate() {
                            *a += k * src[i + c] as i32;
                        }
                    }
                }
                let o = x as usize * 4;
                for (c, a) in acc.iter().enumerate() {
                    row[o + c] = (a / divisor).clamp(0, 255) as u8;
                }
            }
        });
}
