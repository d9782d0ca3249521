//! Photo intake and data URI handling.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;
use thiserror::Error;

/// Intake cap for photo files: 5 MiB.
pub const MAX_PHOTO_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum PhotoIntakeError {
    #[error("File is too large ({size} bytes). Please select an image under {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("Photo file is empty")]
    Empty,

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to read photo: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads photo files into data URIs, enforcing the size cap before any
/// value reaches the validator.
#[derive(Debug, Clone, Copy)]
pub struct PhotoIntake {
    max_bytes: u64,
}

impl PhotoIntake {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn from_path(&self, path: &Path) -> Result<String, PhotoIntakeError> {
        let size = std::fs::metadata(path)?.len();
        self.check_size(size)?;
        let bytes = std::fs::read(path)?;
        self.from_bytes(&bytes)
    }

    pub fn from_bytes(&self, bytes: &[u8]) -> Result<String, PhotoIntakeError> {
        self.check_size(bytes.len() as u64)?;
        if bytes.is_empty() {
            return Err(PhotoIntakeError::Empty);
        }
        let format = image::guess_format(bytes).map_err(|_| PhotoIntakeError::UnsupportedFormat)?;
        Ok(encode_data_uri(format.to_mime_type(), bytes))
    }

    fn check_size(&self, size: u64) -> Result<(), PhotoIntakeError> {
        if size > self.max_bytes {
            log::warn!("photo rejected at intake: {size} bytes exceeds {}", self.max_bytes);
            return Err(PhotoIntakeError::TooLarge { size, limit: self.max_bytes });
        }
        Ok(())
    }
}

impl Default for PhotoIntake {
    fn default() -> Self {
        Self::new(MAX_PHOTO_BYTES)
    }
}

pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Decoded `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    /// Parses `data:<mime>;base64,<payload>`. Returns `None` for anything
    /// else, including non-base64 data URIs.
    pub fn parse(uri: &str) -> Option<Self> {
        let rest = uri.trim().strip_prefix("data:")?;
        let (meta, payload) = rest.split_once(',')?;
        let mime = meta.strip_suffix(";base64")?;
        let bytes = STANDARD.decode(payload.trim()).ok()?;
        if bytes.is_empty() {
            return None;
        }
        Some(Self {
            mime: mime.to_string(),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_intake_produces_png_data_uri() {
        let uri = PhotoIntake::default().from_bytes(&tiny_png()).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
        let parsed = DataUri::parse(&uri).unwrap();
        assert_eq!(parsed.mime, "image/png");
        assert_eq!(parsed.bytes, tiny_png());
    }

    #[test]
    fn test_intake_rejects_oversized_photo() {
        let intake = PhotoIntake::new(16);
        let err = intake.from_bytes(&[0u8; 17]).unwrap_err();
        assert!(matches!(err, PhotoIntakeError::TooLarge { size: 17, limit: 16 }));
    }

    #[test]
    fn test_intake_rejects_non_image_bytes() {
        let err = PhotoIntake::default().from_bytes(b"plain text").unwrap_err();
        assert!(matches!(err, PhotoIntakeError::UnsupportedFormat));
    }

    #[test]
    fn test_intake_from_path_checks_size_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.png");
        std::fs::write(&path, vec![0u8; 64]).unwrap();
        let err = PhotoIntake::new(32).from_path(&path).unwrap_err();
        assert!(matches!(err, PhotoIntakeError::TooLarge { .. }));
    }

    #[test]
    fn test_parse_rejects_malformed_uris() {
        assert!(DataUri::parse("").is_none());
        assert!(DataUri::parse("/placeholder.svg").is_none());
        assert!(DataUri::parse("data:image/png,rawtext").is_none());
        assert!(DataUri::parse("data:image/png;base64,!!!").is_none());
    }
}
