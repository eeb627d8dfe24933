//! Preprocessor: encoded image bytes to a normalized `[1, 3, H, W]` tensor
//!
//! Decoding and resizing go through the `image` crate. The default resize is
//! an anti-aliased bilinear filter that reproduces the PIL resize used when
//! the weights were trained; plain `image` filters are available through
//! [`ResizeFilter`].

use burn::tensor::{backend::Backend, Tensor, TensorData};
use image::{imageops::FilterType, Rgb, RgbImage};

use crate::config::{PreprocessConfig, ResizeFilter};
use crate::utils::error::{DefectError, Result};

/// Decodes, resizes and normalizes images for the classifier
#[derive(Debug, Clone)]
pub struct Preprocessor {
    image_size: u32,
    mean: [f32; 3],
    std: [f32; 3],
    filter: ResizeFilter,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(&PreprocessConfig::default())
    }
}

impl Preprocessor {
    pub fn new(config: &PreprocessConfig) -> Self {
        Self {
            image_size: config.image_size,
            mean: config.mean,
            std: config.std,
            filter: config.filter,
        }
    }

    /// Shape of the produced tensor: [batch=1, channels=3, height, width]
    pub fn input_shape(&self) -> [usize; 4] {
        let side = self.image_size as usize;
        [1, 3, side, side]
    }

    /// Decode bytes in any supported format into an RGB image
    pub fn decode(&self, bytes: &[u8]) -> Result<RgbImage> {
        if bytes.is_empty() {
            return Err(DefectError::Decode("empty image payload".to_string()));
        }

        let image = image::load_from_memory(bytes)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(DefectError::Decode("image has no pixels".to_string()));
        }

        Ok(image.to_rgb8())
    }

    /// Resize to `image_size x image_size`, ignoring aspect ratio
    pub fn resize(&self, image: &RgbImage) -> RgbImage {
        let side = self.image_size;
        match self.filter {
            ResizeFilter::PilBilinear => pil_bilinear_resize(image, side, side),
            ResizeFilter::Nearest => image::imageops::resize(image, side, side, FilterType::Nearest),
            ResizeFilter::Triangle => {
                image::imageops::resize(image, side, side, FilterType::Triangle)
            }
            ResizeFilter::CatmullRom => {
                image::imageops::resize(image, side, side, FilterType::CatmullRom)
            }
            ResizeFilter::Lanczos3 => {
                image::imageops::resize(image, side, side, FilterType::Lanczos3)
            }
        }
    }

    /// Scale to [0, 1], apply `(x - mean) / std` per channel, lay out as CHW planes
    pub fn normalize(&self, image: &RgbImage) -> Vec<f32> {
        let (width, height) = image.dimensions();
        let num_pixels = (width * height) as usize;

        let mut normalized = vec![0.0f32; 3 * num_pixels];

        for (i, pixel) in image.pixels().enumerate() {
            for c in 0..3 {
                let x = pixel[c] as f32 / 255.0;
                normalized[c * num_pixels + i] = (x - self.mean[c]) / self.std[c];
            }
        }

        normalized
    }

    /// Decode, resize and normalize into a flat CHW buffer
    pub fn preprocess_to_vec(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        let image = self.decode(bytes)?;
        let resized = self.resize(&image);
        Ok(self.normalize(&resized))
    }

    /// Decode, resize and normalize into a single-image batch on `device`
    pub fn preprocess<B: Backend>(&self, bytes: &[u8], device: &B::Device) -> Result<Tensor<B, 4>> {
        let data = self.preprocess_to_vec(bytes)?;
        Ok(Tensor::from_data(
            TensorData::new(data, self.input_shape()),
            device,
        ))
    }
}

/// Separable triangle-filter resize whose support widens with the downscale
/// factor, matching PIL's `Image.resize(size, BILINEAR)`.
fn pil_bilinear_resize(src: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (src_width, src_height) = src.dimensions();
    let columns = filter_taps(src_width, width);
    let rows = filter_taps(src_height, height);

    // Horizontal pass: [src_height][width][3], kept in f32
    let mut horizontal = vec![0.0f32; src_height as usize * width as usize * 3];
    for y in 0..src_height {
        for (x, taps) in columns.iter().enumerate() {
            let mut acc = [0.0f32; 3];
            for &(sx, weight) in taps {
                let pixel = src.get_pixel(sx, y);
                for c in 0..3 {
                    acc[c] += pixel[c] as f32 * weight;
                }
            }
            let offset = (y as usize * width as usize + x) * 3;
            horizontal[offset..offset + 3].copy_from_slice(&acc);
        }
    }

    // Vertical pass
    let mut dst = RgbImage::new(width, height);
    for (y, taps) in rows.iter().enumerate() {
        for x in 0..width as usize {
            let mut acc = [0.0f32; 3];
            for &(sy, weight) in taps {
                let offset = (sy as usize * width as usize + x) * 3;
                for c in 0..3 {
                    acc[c] += horizontal[offset + c] * weight;
                }
            }
            dst.put_pixel(
                x as u32,
                y as u32,
                Rgb(acc.map(|v| v.round().clamp(0.0, 255.0) as u8)),
            );
        }
    }

    dst
}

/// Source indices and normalized weights contributing to each output index
fn filter_taps(src_len: u32, dst_len: u32) -> Vec<Vec<(u32, f32)>> {
    let scale = src_len as f32 / dst_len as f32;
    let support = scale.max(1.0);

    (0..dst_len)
        .map(|i| {
            let center = (i as f32 + 0.5) * scale;
            let lo = (center - support).floor().max(0.0) as u32;
            let hi = ((center + support).ceil() as u32).min(src_len);

            let mut taps: Vec<(u32, f32)> = (lo..hi)
                .filter_map(|s| {
                    let distance = ((s as f32 + 0.5) - center).abs() / support;
                    (distance < 1.0).then(|| (s, 1.0 - distance))
                })
                .collect();

            let total: f32 = taps.iter().map(|&(_, w)| w).sum();
            if total > 0.0 {
                for tap in &mut taps {
                    tap.1 /= total;
                }
            } else {
                let nearest = (center as u32).min(src_len - 1);
                taps = vec![(nearest, 1.0)];
            }

            taps
        })
        .collect()
}
