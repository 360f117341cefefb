//! TIFF decoding through the `image` crate.

use std::path::Path;

use image::DynamicImage;
use ndarray::{ArrayD, IxDyn};

use crate::error::{Error, Result};
use crate::volume::Volume;

/// Read a TIFF file into a `[height, width]` or `[height, width, channels]` array.
///
/// Sample values are kept in their stored range (0-255 for 8-bit images,
/// 0-65535 for 16-bit images).
pub(crate) fn read_tiff(path: &Path) -> Result<Volume> {
    let image = image::open(path)?;
    to_volume(image).map_err(|reason| Error::ImageLoad {
        path: path.to_path_buf(),
        reason,
    })
}

fn to_volume(image: DynamicImage) -> std::result::Result<Volume, String> {
    let width = image.width() as usize;
    let height = image.height() as usize;

    let (channels, values): (usize, Vec<f32>) = match image {
        DynamicImage::ImageLuma8(buf) => (1, widen(buf.as_raw())),
        DynamicImage::ImageLumaA8(buf) => (2, widen(buf.as_raw())),
        DynamicImage::ImageRgb8(buf) => (3, widen(buf.as_raw())),
        DynamicImage::ImageRgba8(buf) => (4, widen(buf.as_raw())),
        DynamicImage::ImageLuma16(buf) => (1, widen(buf.as_raw())),
        DynamicImage::ImageLumaA16(buf) => (2, widen(buf.as_raw())),
        DynamicImage::ImageRgb16(buf) => (3, widen(buf.as_raw())),
        DynamicImage::ImageRgba16(buf) => (4, widen(buf.as_raw())),
        DynamicImage::ImageRgb32F(buf) => (3, buf.into_raw()),
        DynamicImage::ImageRgba32F(buf) => (4, buf.into_raw()),
        other => return Err(format!("unsupported pixel layout {:?}", other.color())),
    };

    let shape = if channels == 1 {
        vec![height, width]
    } else {
        vec![height, width, channels]
    };
    ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|e| e.to_string())
}

fn widen<T: Copy + Into<f32>>(samples: &[T]) -> Vec<f32> {
    samples.iter().map(|&s| s.into()).collect()
}
