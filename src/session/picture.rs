//! Still picture requests and result assembly.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::CameraError;
use crate::platform::EncodedImage;

/// Options accepted by `takePicture`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PictureOptions {
    /// JPEG quality in `[0, 1]`. `None` uses the configured default.
    pub quality: Option<f32>,
    /// Include the JPEG as a base64 string in the result.
    pub base64: bool,
    /// Do not write the picture to the photo directory.
    pub skip_file: bool,
}

impl PictureOptions {
    pub fn with_quality(quality: f32) -> Self {
        Self {
            quality: Some(quality),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), CameraError> {
        match self.quality {
            Some(q) if !(0.0..=1.0).contains(&q) => Err(CameraError::InvalidArgument(format!(
                "picture quality {q} outside [0, 1]"
            ))),
            _ => Ok(()),
        }
    }
}

/// Maps a `[0, 1]` quality onto the encoder's 1-100 scale.
pub fn jpeg_quality(quality: f32) -> u8 {
    ((quality * 100.0).round() as u8).clamp(1, 100)
}

/// A captured still as returned to the host.
#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PictureResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    pub captured_at: DateTime<Utc>,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl PictureResult {
    /// Path on disk when the picture was stored.
    pub fn path(&self) -> Option<PathBuf> {
        self.uri
            .as_deref()
            .and_then(|uri| uri.strip_prefix("file://"))
            .map(PathBuf::from)
    }
}

impl std::fmt::Debug for PictureResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PictureResult")
            .field("uri", &self.uri)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("base64", &self.base64.as_ref().map(String::len))
            .field("captured_at", &self.captured_at)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Builds the host result for an encoded frame, storing it when asked to.
pub fn assemble_picture(
    image: EncodedImage,
    options: &PictureOptions,
    photo_dir: Option<&Path>,
) -> Result<PictureResult, CameraError> {
    if image.data.is_empty() {
        return Err(CameraError::CaptureFailed("empty image buffer".into()));
    }

    let captured_at = Utc::now();
    let uri = match photo_dir {
        Some(dir) if !options.skip_file => {
            let path = store_picture(dir, &image.data, captured_at)?;
            Some(format!("file://{}", path.display()))
        }
        _ => None,
    };

    Ok(PictureResult {
        uri,
        width: image.width,
        height: image.height,
        base64: options.base64.then(|| STANDARD.encode(&image.data)),
        captured_at,
        data: image.data,
    })
}

/// Writes JPEG bytes into `dir` under a unique timestamped name.
pub fn store_picture(
    dir: &Path,
    data: &[u8],
    captured_at: DateTime<Utc>,
) -> Result<PathBuf, CameraError> {
    fs::create_dir_all(dir)
        .map_err(|e| CameraError::Storage(format!("{}: {e}", dir.display())))?;

    let suffix = Uuid::new_v4().simple().to_string();
    let name = format!(
        "IMG_{}_{}.jpg",
        captured_at.format("%Y%m%d_%H%M%S"),
        &suffix[..8]
    );
    let path = dir.join(name);
    fs::write(&path, data).map_err(|e| CameraError::Storage(format!("{}: {e}", path.display())))?;

    tracing::debug!(path = %path.display(), bytes = data.len(), "Stored picture");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> EncodedImage {
        EncodedImage {
            data: vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 0xFF, 0xD9],
            width: 4,
            height: 3,
        }
    }

    #[test]
    fn test_quality_mapping() {
        assert_eq!(jpeg_quality(1.0), 100);
        assert_eq!(jpeg_quality(0.8), 80);
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(0.004), 1);
    }

    #[test]
    fn test_quality_validation() {
        assert!(PictureOptions::with_quality(0.5).validate().is_ok());
        assert!(PictureOptions::default().validate().is_ok());
        assert!(PictureOptions::with_quality(1.5).validate().is_err());
        assert!(PictureOptions::with_quality(-0.1).validate().is_err());
        assert!(PictureOptions::with_quality(f32::NAN).validate().is_err());
    }

    #[test]
    fn test_options_from_host_json() {
        let options: PictureOptions =
            serde_json::from_str(r#"{"quality":0.8,"skipFile":true}"#).unwrap();
        assert_eq!(options.quality, Some(0.8));
        assert!(options.skip_file);
        assert!(!options.base64);
    }

    #[test]
    fn test_assemble_writes_file_and_base64() {
        let dir = tempfile::tempdir().unwrap();
        let options = PictureOptions {
            base64: true,
            ..Default::default()
        };
        let result = assemble_picture(image(), &options, Some(dir.path())).unwrap();

        let path = result.path().unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(fs::read(&path).unwrap(), image().data);
        assert_eq!(
            STANDARD.decode(result.base64.as_ref().unwrap()).unwrap(),
            image().data
        );
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("IMG_") && name.ends_with(".jpg"));
    }

    #[test]
    fn test_skip_file_leaves_no_uri() {
        let dir = tempfile::tempdir().unwrap();
        let options = PictureOptions {
            skip_file: true,
            ..Default::default()
        };
        let result = assemble_picture(image(), &options, Some(dir.path())).unwrap();
        assert_eq!(result.uri, None);
        assert_eq!(result.base64, None);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("uri").is_none());
        assert_eq!(json["width"], 4);
    }

    #[test]
    fn test_empty_buffer_is_capture_failure() {
        let empty = EncodedImage {
            data: Vec::new(),
            width: 0,
            height: 0,
        };
        assert!(matches!(
            assemble_picture(empty, &PictureOptions::default(), None),
            Err(CameraError::CaptureFailed(_))
        ));
    }
}
