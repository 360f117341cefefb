//! Image loading into dense arrays.
//!
//! Predictions and ground truth arrive as TIFF or MetaImage (`.mha`) files.
//! Both are loaded into a [`Volume`], an `f32` array whose shape follows the
//! numpy convention: slowest spatial axis first, with a trailing channel axis
//! when the image has more than one component per pixel.
//!
//! | Extension | Decoder |
//! |-----------|---------|
//! | `.tif`, `.tiff` | `image` crate |
//! | `.mha` | [`mha`] |

pub mod mha;
mod tiff;

use std::path::{Path, PathBuf};

use ndarray::ArrayD;
use tracing::debug;

use crate::error::{Error, Result};

pub use mha::write_mha;

/// Dense image data, one `f32` per voxel and channel.
pub type Volume = ArrayD<f32>;

/// Extensions accepted in an output directory, in the order they are searched.
pub const IMAGE_EXTENSIONS: &[&str] = &["tif", "tiff", "mha"];

/// Load the single image stored in `location`.
///
/// The directory must contain exactly one file with an extension from
/// [`IMAGE_EXTENSIONS`]. Zero or several candidates is an
/// [`Error::AmbiguousInput`].
pub fn load_image_file(location: &Path) -> Result<Volume> {
    let path = find_single_image(location)?;
    load_as_array(&path)
}

/// Find the single image file in `location`.
pub fn find_single_image(location: &Path) -> Result<PathBuf> {
    let candidates = image_candidates(location)?;
    match candidates.as_slice() {
        [single] => Ok(single.clone()),
        _ => Err(Error::AmbiguousInput {
            location: location.to_path_buf(),
            found: candidates.len(),
        }),
    }
}

/// All recognized image files directly inside `location`, ordered by
/// extension preference and then by file name.
///
/// A missing directory yields no candidates.
pub fn image_candidates(location: &Path) -> Result<Vec<PathBuf>> {
    if !location.is_dir() {
        return Ok(Vec::new());
    }

    let mut found: Vec<(usize, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(location)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(rank) = extension_rank(&path) {
            found.push((rank, path));
        }
    }

    found.sort();
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

fn extension_rank(path: &Path) -> Option<usize> {
    let ext = path.extension()?.to_str()?;
    IMAGE_EXTENSIONS
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(ext))
}

/// Load an image file into a [`Volume`], dispatching on its extension.
pub fn load_as_array(path: &Path) -> Result<Volume> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();

    let volume = match ext.as_str() {
        "tif" | "tiff" => tiff::read_tiff(path)?,
        "mha" => mha::read_mha(path)?,
        other => {
            return Err(Error::UnsupportedFormat(format!(
                "{} (extension {:?})",
                path.display(),
                other
            )));
        }
    };

    debug!(path = %path.display(), shape = ?volume.shape(), "loaded image");
    Ok(volume)
}
