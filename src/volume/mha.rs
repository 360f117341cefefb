//! MetaImage (`.mha`) reading and writing.
//!
//! A MetaImage file is a plain-text header of `Key = Value` lines followed by
//! the raw voxel buffer. The header ends with `ElementDataFile = LOCAL`; the
//! payload starts on the next byte and is either raw or a zlib stream
//! (`CompressedData = True`). Voxels are stored with the first `DimSize` axis
//! varying fastest and channels interleaved per voxel.
//!
//! Only single-file (`LOCAL`) images are supported.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use ndarray::{ArrayD, IxDyn};

use crate::error::{Error, Result};
use crate::volume::Volume;

/// Voxel element types understood by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl ElementType {
    fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "MET_CHAR" => Self::I8,
            "MET_UCHAR" => Self::U8,
            "MET_SHORT" => Self::I16,
            "MET_USHORT" => Self::U16,
            "MET_INT" | "MET_LONG" => Self::I32,
            "MET_UINT" | "MET_ULONG" => Self::U32,
            "MET_FLOAT" => Self::F32,
            "MET_DOUBLE" => Self::F64,
            _ => return None,
        })
    }

    /// Size of one element in bytes.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    fn decode(self, bytes: &[u8], msb: bool) -> f32 {
        macro_rules! num {
            ($t:ty) => {{
                let raw: [u8; std::mem::size_of::<$t>()] =
                    bytes.try_into().unwrap_or([0; std::mem::size_of::<$t>()]);
                if msb {
                    <$t>::from_be_bytes(raw)
                } else {
                    <$t>::from_le_bytes(raw)
                }
            }};
        }

        match self {
            Self::I8 => f32::from(bytes[0] as i8),
            Self::U8 => f32::from(bytes[0]),
            Self::I16 => f32::from(num!(i16)),
            Self::U16 => f32::from(num!(u16)),
            Self::I32 => num!(i32) as f32,
            Self::U32 => num!(u32) as f32,
            Self::F32 => num!(f32),
            Self::F64 => narrow(num!(f64)),
        }
    }
}

/// Narrow a double to `f32` without turning nonzero values into zero.
///
/// Values below the `f32` range are clamped to the smallest normal `f32`
/// with the same sign, so a foreground voxel stays foreground.
fn narrow(value: f64) -> f32 {
    let narrowed = value as f32;
    if narrowed == 0.0 && value != 0.0 {
        f32::MIN_POSITIVE.copysign(narrowed)
    } else {
        narrowed
    }
}

/// Parsed MetaImage header.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// Size of each axis, fastest-varying first.
    pub dim_size: Vec<usize>,
    /// Voxel element type.
    pub element_type: ElementType,
    /// Components per voxel.
    pub channels: usize,
    /// Whether the payload is a zlib stream.
    pub compressed: bool,
    /// Whether multi-byte elements are big-endian.
    pub msb: bool,
}

impl Header {
    /// Array shape in slowest-axis-first order, with a trailing channel axis
    /// when the image has more than one channel.
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        let mut shape: Vec<usize> = self.dim_size.iter().rev().copied().collect();
        if self.channels > 1 {
            shape.push(self.channels);
        }
        shape
    }

    /// Number of elements in the payload, or `None` if it does not fit in `usize`.
    #[must_use]
    pub fn element_count(&self) -> Option<usize> {
        self.dim_size
            .iter()
            .try_fold(self.channels, |acc, &dim| acc.checked_mul(dim))
    }
}

/// Read a MetaImage file.
pub fn read_mha(path: &Path) -> Result<Volume> {
    let data = std::fs::read(path).map_err(|e| Error::ImageLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    decode_mha(&data).map_err(|reason| Error::ImageLoad {
        path: path.to_path_buf(),
        reason,
    })
}

/// Decode an in-memory MetaImage.
pub fn decode_mha(data: &[u8]) -> std::result::Result<Volume, String> {
    let (header, offset) = parse_header(data)?;
    let payload = &data[offset..];

    let inflated;
    let raw = if header.compressed {
        let mut buf = Vec::new();
        ZlibDecoder::new(payload)
            .read_to_end(&mut buf)
            .map_err(|e| format!("failed to inflate payload: {e}"))?;
        inflated = buf;
        inflated.as_slice()
    } else {
        payload
    };

    let size = header.element_type.size();
    let expected = header
        .element_count()
        .and_then(|count| count.checked_mul(size))
        .ok_or("DimSize overflows")?;
    if raw.len() < expected {
        return Err(format!(
            "payload has {} bytes, header requires {}",
            raw.len(),
            expected
        ));
    }

    let values: Vec<f32> = raw[..expected]
        .chunks_exact(size)
        .map(|chunk| header.element_type.decode(chunk, header.msb))
        .collect();

    ArrayD::from_shape_vec(IxDyn(&header.shape()), values).map_err(|e| e.to_string())
}

/// Parse the text header, returning it and the byte offset of the payload.
pub fn parse_header(data: &[u8]) -> std::result::Result<(Header, usize), String> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut pos = 0;

    loop {
        let Some(len) = data[pos..].iter().position(|&b| b == b'\n') else {
            return Err("header is not terminated by ElementDataFile".to_string());
        };
        let line = std::str::from_utf8(&data[pos..pos + len])
            .map_err(|_| "header is not valid UTF-8".to_string())?
            .trim();
        pos += len + 1;

        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(format!("malformed header line: {line:?}"));
        };
        let key = key.trim();
        let value = value.trim();

        if key == "ElementDataFile" {
            if value != "LOCAL" {
                return Err(format!("detached data files are not supported ({value})"));
            }
            break;
        }
        fields.insert(key.to_string(), value.to_string());
    }

    let flag = |key: &str| {
        fields
            .get(key)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    };

    let dim_size: Vec<usize> = fields
        .get("DimSize")
        .ok_or("missing DimSize")?
        .split_whitespace()
        .map(|v| v.parse::<usize>().map_err(|e| format!("bad DimSize: {e}")))
        .collect::<std::result::Result<_, _>>()?;

    if let Some(ndims) = fields.get("NDims") {
        let ndims: usize = ndims.parse().map_err(|e| format!("bad NDims: {e}"))?;
        if ndims != dim_size.len() {
            return Err(format!(
                "NDims is {ndims} but DimSize has {} entries",
                dim_size.len()
            ));
        }
    }

    let element_type = fields
        .get("ElementType")
        .ok_or("missing ElementType")
        .and_then(|v| ElementType::parse(v).ok_or("unsupported ElementType"))?;

    let channels = match fields.get("ElementNumberOfChannels") {
        Some(v) => v
            .parse::<usize>()
            .map_err(|e| format!("bad ElementNumberOfChannels: {e}"))?
            .max(1),
        None => 1,
    };

    let header = Header {
        dim_size,
        element_type,
        channels,
        compressed: flag("CompressedData"),
        msb: flag("BinaryDataByteOrderMSB") || flag("ElementByteOrderMSB"),
    };
    Ok((header, pos))
}

/// Write an 8-bit MetaImage.
///
/// Every axis of `array` is treated as spatial; the last axis becomes the
/// first `DimSize` entry.
pub fn write_mha(path: &Path, array: &ArrayD<u8>, compress: bool) -> Result<()> {
    let dims: Vec<String> = array.shape().iter().rev().map(|d| d.to_string()).collect();
    let voxels: Vec<u8> = array.iter().copied().collect();

    let payload = if compress {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&voxels)?;
        encoder.finish()?
    } else {
        voxels
    };

    let mut header = String::new();
    header.push_str("ObjectType = Image\n");
    header.push_str(&format!("NDims = {}\n", dims.len()));
    header.push_str("BinaryData = True\n");
    header.push_str("BinaryDataByteOrderMSB = False\n");
    if compress {
        header.push_str("CompressedData = True\n");
        header.push_str(&format!("CompressedDataSize = {}\n", payload.len()));
    } else {
        header.push_str("CompressedData = False\n");
    }
    header.push_str(&format!("DimSize = {}\n", dims.join(" ")));
    header.push_str("ElementType = MET_UCHAR\n");
    header.push_str("ElementDataFile = LOCAL\n");

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    file.write_all(header.as_bytes())?;
    file.write_all(&payload)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(extra: &str, payload: &[u8]) -> Vec<u8> {
        let mut data = format!(
            "ObjectType = Image\nNDims = 2\nBinaryData = True\n{extra}ElementDataFile = LOCAL\n"
        )
        .into_bytes();
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn test_decode_uncompressed_u8() {
        let data = header_bytes(
            "DimSize = 3 2\nElementType = MET_UCHAR\n",
            &[0, 1, 2, 3, 4, 5],
        );
        let volume = decode_mha(&data).unwrap();
        // DimSize is x-first; the array is row-major [y, x].
        assert_eq!(volume.shape(), &[2, 3]);
        assert_eq!(volume[[1, 0]], 3.0);
        assert_eq!(volume[[0, 2]], 2.0);
    }

    #[test]
    fn test_decode_big_endian_u16() {
        let data = header_bytes(
            "DimSize = 2 1\nElementType = MET_USHORT\nBinaryDataByteOrderMSB = True\n",
            &[0x01, 0x00, 0x00, 0x02],
        );
        let volume = decode_mha(&data).unwrap();
        assert_eq!(volume[[0, 0]], 256.0);
        assert_eq!(volume[[0, 1]], 2.0);
    }

    #[test]
    fn test_decode_little_endian_float() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1.5f32.to_le_bytes());
        payload.extend_from_slice(&(-2.0f32).to_le_bytes());
        let data = header_bytes("DimSize = 2 1\nElementType = MET_FLOAT\n", &payload);
        let volume = decode_mha(&data).unwrap();
        assert_eq!(volume[[0, 0]], 1.5);
        assert_eq!(volume[[0, 1]], -2.0);
    }

    #[test]
    fn test_decode_multichannel() {
        let data = header_bytes(
            "DimSize = 2 1\nElementType = MET_UCHAR\nElementNumberOfChannels = 3\n",
            &[10, 20, 30, 40, 50, 60],
        );
        let volume = decode_mha(&data).unwrap();
        assert_eq!(volume.shape(), &[1, 2, 3]);
        assert_eq!(volume[[0, 1, 2]], 60.0);
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let data = header_bytes("DimSize = 4 4\nElementType = MET_UCHAR\n", &[0; 3]);
        let err = decode_mha(&data).unwrap_err();
        assert!(err.contains("payload"));
    }

    #[test]
    fn test_ndims_mismatch_rejected() {
        let data = header_bytes("DimSize = 4 4 4\nElementType = MET_UCHAR\n", &[0; 64]);
        assert!(decode_mha(&data).is_err());
    }

    #[test]
    fn test_detached_data_rejected() {
        let data = b"NDims = 1\nDimSize = 1\nElementType = MET_UCHAR\nElementDataFile = image.raw\n";
        let err = decode_mha(data).unwrap_err();
        assert!(err.contains("detached"));
    }

    #[test]
    fn test_tiny_doubles_stay_nonzero() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1e-60f64.to_le_bytes());
        payload.extend_from_slice(&0.0f64.to_le_bytes());
        payload.extend_from_slice(&(-1e-60f64).to_le_bytes());
        let data = header_bytes("DimSize = 3 1\nElementType = MET_DOUBLE\n", &payload);
        let volume = decode_mha(&data).unwrap();
        assert_eq!(volume[[0, 0]], f32::MIN_POSITIVE);
        assert_eq!(volume[[0, 1]], 0.0);
        assert_eq!(volume[[0, 2]], -f32::MIN_POSITIVE);
    }

    #[test]
    fn test_oversized_dim_size_rejected() {
        let data = b"NDims = 3\nDimSize = 4294967296 4294967296 4294967296\n\
            ElementType = MET_UCHAR\nElementDataFile = LOCAL\n";
        let (header, _) = parse_header(data).unwrap();
        assert_eq!(header.element_count(), None);

        let err = decode_mha(data).unwrap_err();
        assert_eq!(err, "DimSize overflows");
    }

    #[test]
    fn test_missing_file_error_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.mha");
        match read_mha(&path).unwrap_err() {
            Error::ImageLoad { path: failed, .. } => assert_eq!(failed, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_write_then_read_compressed_volume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volume.mha");
        let array = ArrayD::from_shape_fn(IxDyn(&[2, 3, 4]), |ix| {
            if (ix[0] + ix[1] + ix[2]) % 2 == 0 { 255u8 } else { 0 }
        });

        write_mha(&path, &array, true).unwrap();
        let volume = read_mha(&path).unwrap();

        assert_eq!(volume.shape(), &[2, 3, 4]);
        assert_eq!(volume.mapv(|v| v as u8), array);
    }

    #[test]
    fn test_written_header_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.mha");
        write_mha(&path, &ArrayD::zeros(IxDyn(&[5, 7])), false).unwrap();

        let data = std::fs::read(&path).unwrap();
        let (header, offset) = parse_header(&data).unwrap();
        assert_eq!(header.dim_size, vec![7, 5]);
        assert_eq!(header.element_type, ElementType::U8);
        assert!(!header.compressed);
        assert_eq!(data.len() - offset, 35);
    }
}
