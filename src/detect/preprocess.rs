//! Image → model input conversion.
//!
//! The source image is scaled to the model's square input with a bilinear
//! (`Triangle`) filter and serialized as `f32` channels in `[0, 1]`.

use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use serde::Deserialize;

/// Memory layout of the input tensor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[1, H, W, 3]`, channels interleaved per pixel.
    #[default]
    Nhwc,
    /// `[1, 3, H, W]`, one plane per channel.
    Nchw,
}

impl TensorLayout {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nhwc" => Ok(Self::Nhwc),
            "nchw" => Ok(Self::Nchw),
            other => Err(anyhow!("unknown tensor layout {:?} (expected nhwc or nchw)", other)),
        }
    }

    pub fn shape(self, size: usize) -> [usize; 4] {
        match self {
            Self::Nhwc => [1, size, size, 3],
            Self::Nchw => [1, 3, size, size],
        }
    }
}

/// Dense `f32` model input.
#[derive(Clone, Debug, PartialEq)]
pub struct InputTensor {
    pub data: Vec<f32>,
    pub shape: [usize; 4],
}

/// Wrap a raw RGBA buffer handed over by the host.
pub fn frame_from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<DynamicImage> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "expected {} RGBA bytes, received {}",
            expected,
            pixels.len()
        ));
    }
    let image = RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| anyhow!("RGBA buffer does not match {}x{}", width, height))?;
    Ok(DynamicImage::ImageRgba8(image))
}

/// Resize `image` to `size`×`size` and serialize it in `layout`.
pub fn to_input_tensor(
    image: &DynamicImage,
    size: u32,
    layout: TensorLayout,
) -> Result<InputTensor> {
    if image.width() == 0 || image.height() == 0 {
        return Err(anyhow!("cannot run inference on an empty image"));
    }
    if size == 0 {
        return Err(anyhow!("model input size must be greater than zero"));
    }

    let resized = image.resize_exact(size, size, FilterType::Triangle).to_rgb8();
    let side = size as usize;
    let plane = side * side;
    let mut data = vec![0f32; plane * 3];

    for (idx, pixel) in resized.pixels().enumerate() {
        for channel in 0..3 {
            let value = pixel.0[channel] as f32 / 255.0;
            let offset = match layout {
                TensorLayout::Nhwc => idx * 3 + channel,
                TensorLayout::Nchw => channel * plane + idx,
            };
            data[offset] = value;
        }
    }

    Ok(InputTensor {
        data,
        shape: layout.shape(side),
    })
}
