//! Image primitives used by the classifier and the filter pipelines.
//!
//! Single-channel operations work on 8-bit `GrayImage`s. Neighborhood
//! operations replicate the border pixels.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbaImage};
use imageproc::distance_transform::Norm;
use imageproc::{filter, gradients};

use crate::config::{BilateralParams, ThresholdParams};
use crate::error::{Result, TracerError};

/// How the local threshold of [`adaptive_threshold`] is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptiveMethod {
    /// Unweighted mean of the block.
    Mean,
    /// Gaussian-weighted mean of the block.
    Gaussian,
}

/// Luminance of an RGBA image.
pub fn to_gray(image: &RgbaImage) -> GrayImage {
    imageops::grayscale(image)
}

/// Expand a single-channel image to opaque RGBA.
pub fn gray_to_rgba(gray: &GrayImage) -> RgbaImage {
    RgbaImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y)[0];
        image::Rgba([v, v, v, 255])
    })
}

/// Downscale with area averaging.
///
/// The triangle filter widens its support by the scale factor when
/// shrinking, so every source pixel contributes to the output.
pub fn resize_area(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    imageops::resize(image, width, height, FilterType::Triangle)
}

/// Resize with linear interpolation.
pub fn resize_linear(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    imageops::resize(image, width, height, FilterType::Triangle)
}

/// Edge-preserving bilateral smoothing.
///
/// The window is `2 * (diameter / 2) + 1` pixels wide, so even diameters
/// reach `diameter / 2` pixels on each side of the center.
pub fn bilateral_filter(gray: &GrayImage, params: &BilateralParams) -> GrayImage {
    if gray.width() == 0 || gray.height() == 0 {
        return gray.clone();
    }
    let window = (params.diameter / 2) * 2 + 1;
    filter::bilateral_filter(gray, window, params.sigma_color, params.sigma_space)
}

/// Gaussian sigma used for a kernel of `size` taps when none is given.
fn gaussian_sigma_for(size: u32) -> f64 {
    0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

fn gaussian_kernel(size: u32) -> Vec<f32> {
    let sigma = gaussian_sigma_for(size);
    let half = (size / 2) as i64;
    let raw: Vec<f64> = (-half..=half)
        .map(|i| (-((i * i) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f64 = raw.iter().sum();
    raw.iter().map(|v| (v / total) as f32).collect()
}

/// Separable convolution with a normalized 1D kernel. The intermediate pass
/// stays in floating point and only the result is rounded to 8 bits.
fn smooth_separable(gray: &GrayImage, kernel: &[f32]) -> GrayImage {
    let (width, height) = gray.dimensions();
    let w = width as i64;
    let h = height as i64;
    let radius = (kernel.len() / 2) as i64;
    let src = gray.as_raw();

    let mut horizontal = vec![0.0f32; src.len()];
    for y in 0..h {
        let row = (y * w) as usize;
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = (x + k as i64 - radius).clamp(0, w - 1) as usize;
                acc += weight * src[row + sx] as f32;
            }
            horizontal[row + x as usize] = acc;
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y + k as i64 - radius).clamp(0, h - 1);
                acc += weight * horizontal[(sy * w + x) as usize];
            }
            out.put_pixel(x as u32, y as u32, Luma([acc.round().clamp(0.0, 255.0) as u8]));
        }
    }

    out
}

/// Binarize against a local threshold: a pixel becomes 255 when it is
/// brighter than the local mean minus `offset`, 0 otherwise.
pub fn adaptive_threshold(
    gray: &GrayImage,
    method: AdaptiveMethod,
    params: &ThresholdParams,
) -> Result<GrayImage> {
    if params.block_size < 3 || params.block_size % 2 == 0 {
        return Err(TracerError::InvalidConfig(format!(
            "adaptive threshold block size must be odd and >= 3, got {}",
            params.block_size
        )));
    }

    let local_mean = match method {
        AdaptiveMethod::Mean => {
            let radius = params.block_size / 2;
            filter::box_filter(gray, radius, radius)
        }
        AdaptiveMethod::Gaussian => smooth_separable(gray, &gaussian_kernel(params.block_size)),
    };

    let mut out = GrayImage::new(gray.width(), gray.height());
    for ((dst, src), mean) in out
        .pixels_mut()
        .zip(gray.pixels())
        .zip(local_mean.pixels())
    {
        let diff = src[0] as i32 - mean[0] as i32;
        dst[0] = if diff > -params.offset { 255 } else { 0 };
    }
    Ok(out)
}

/// Canny edge map: 255 on edges, 0 elsewhere.
///
/// Gradients are 3x3 Sobel responses of the unblurred image and edge
/// strength is `|gx| + |gy|`. Pixels stronger than `high` seed edges, which
/// then grow through 8-connected pixels stronger than `low`.
pub fn canny_edges(gray: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }
    let gx = gradients::horizontal_sobel(gray);
    let gy = gradients::vertical_sobel(gray);
    let strength: Vec<f32> = gx
        .as_raw()
        .iter()
        .zip(gy.as_raw())
        .map(|(&h, &v)| (h as f32).abs() + (v as f32).abs())
        .collect();

    let thinned = suppress_non_maxima(&strength, gx.as_raw(), gy.as_raw(), width, height);
    trace_hysteresis(&thinned, width, height, low, high)
}

const TAN_22_5: f32 = 0.414_213_57;
const TAN_67_5: f32 = 2.414_213_6;

/// Keep only pixels at least as strong as both neighbors across the
/// gradient. Ties survive, so evenly spaced texture keeps all its edges.
fn suppress_non_maxima(
    strength: &[f32],
    gx: &[i16],
    gy: &[i16],
    width: u32,
    height: u32,
) -> Vec<f32> {
    let w = width as i64;
    let h = height as i64;
    let at = |x: i64, y: i64| -> f32 {
        if x < 0 || y < 0 || x >= w || y >= h {
            0.0
        } else {
            strength[(y * w + x) as usize]
        }
    };

    let mut out = vec![0.0f32; strength.len()];
    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) as usize;
            let m = strength[i];
            if m == 0.0 {
                continue;
            }
            let dx = gx[i] as f32;
            let dy = gy[i] as f32;
            let (ax, ay) = (dx.abs(), dy.abs());
            let (a, b) = if ay <= ax * TAN_22_5 {
                (at(x - 1, y), at(x + 1, y))
            } else if ay >= ax * TAN_67_5 {
                (at(x, y - 1), at(x, y + 1))
            } else if (dx > 0.0) == (dy > 0.0) {
                (at(x - 1, y - 1), at(x + 1, y + 1))
            } else {
                (at(x + 1, y - 1), at(x - 1, y + 1))
            };
            if m >= a && m >= b {
                out[i] = m;
            }
        }
    }
    out
}

fn trace_hysteresis(strength: &[f32], width: u32, height: u32, low: f32, high: f32) -> GrayImage {
    let w = width as i64;
    let h = height as i64;
    let mut out = GrayImage::new(width, height);
    {
        let marks: &mut [u8] = &mut out;
        let mut stack: Vec<(i64, i64)> = Vec::new();
        for (i, &s) in strength.iter().enumerate() {
            if s <= high || marks[i] != 0 {
                continue;
            }
            marks[i] = 255;
            stack.push((i as i64 % w, i as i64 / w));
            while let Some((x, y)) = stack.pop() {
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        let (nx, ny) = (x + dx, y + dy);
                        if nx < 0 || ny < 0 || nx >= w || ny >= h {
                            continue;
                        }
                        let n = (ny * w + nx) as usize;
                        if marks[n] == 0 && strength[n] > low {
                            marks[n] = 255;
                            stack.push((nx, ny));
                        }
                    }
                }
            }
        }
    }
    out
}

/// Number of non-zero pixels.
pub fn count_non_zero(gray: &GrayImage) -> usize {
    gray.as_raw().iter().filter(|&&v| v != 0).count()
}

/// Morphological closing (dilate, then erode) with an elliptical kernel
/// of `kernel_size`x`kernel_size` pixels.
///
/// For the 3x3 kernel the ellipse is the 4-connected cross, which is the
/// L1 ball of radius 1. Dark specks narrower than the kernel disappear.
pub fn close_ellipse(binary: &GrayImage, kernel_size: u32) -> GrayImage {
    let radius = (kernel_size / 2).min(u8::MAX as u32) as u8;
    if radius == 0 {
        return binary.clone();
    }
    imageproc::morphology::close(binary, Norm::L1, radius)
}

/// Quantize intensities down to multiples of `step`.
pub fn posterize(gray: &GrayImage, step: u8) -> GrayImage {
    let step = step.max(1);
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = (pixel[0] / step) * step;
    }
    out
}

/// Per-pixel bitwise AND of two equally sized images.
pub fn bitwise_and(a: &GrayImage, b: &GrayImage) -> Result<GrayImage> {
    if a.dimensions() != b.dimensions() {
        return Err(TracerError::InvalidRaster(format!(
            "bitwise_and size mismatch: {:?} vs {:?}",
            a.dimensions(),
            b.dimensions()
        )));
    }
    let mut out = a.clone();
    for (dst, src) in out.pixels_mut().zip(b.pixels()) {
        dst[0] &= src[0];
    }
    Ok(out)
}
