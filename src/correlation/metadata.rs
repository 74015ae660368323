//! Identifiers and correlation metadata for ingested images

use chrono::{DateTime, TimeZone};
use reqwest::Url;
use serde::Serialize;

use crate::error::{AppError, Result};

/// Prefix of every identifier minted by the ingestion path
pub const IMAGE_ID_PREFIX: &str = "unity_image_";

/// Appended to the original filename stem to name the processed result
pub const RESULT_SUFFIX: &str = "_m";

const DEFAULT_EXTENSION: &str = "png";

/// Mint an image id from an instant, at second resolution
pub fn image_id_at<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}{}", IMAGE_ID_PREFIX, now.format("%Y%m%d_%H%M%S"))
}

/// Timestamp part of an id minted by [`image_id_at`]
pub fn timestamp_of(image_id: &str) -> Option<&str> {
    image_id.strip_prefix(IMAGE_ID_PREFIX)
}

/// What the completion path needs to reunite a processed image with its source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrelationMetadata {
    pub source_url: Option<String>,
    /// Panorama id, the second-to-last URL path segment
    pub correlation_key: String,
    /// Cube face, the last `_` token of the filename stem
    pub face_discriminator: String,
    pub filename_base: String,
    pub original_filename: String,
    pub expected_result_filename: String,
}

impl CorrelationMetadata {
    /// Parse metadata out of a source URL such as
    /// `https://host/images/cubemaps/<pano>/<pano>_f.png`
    pub fn from_url(source_url: &str) -> Result<Self> {
        let url = Url::parse(source_url)
            .map_err(|e| AppError::MalformedUrl(format!("{}: {}", source_url, e)))?;

        let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
        let [.., key, filename] = segments.as_slice() else {
            return Err(AppError::MalformedUrl(format!(
                "{}: expected at least two path segments",
                source_url
            )));
        };

        if key.is_empty() || filename.is_empty() {
            return Err(AppError::MalformedUrl(format!(
                "{}: empty correlation key or filename",
                source_url
            )));
        }

        let filename_base = filename.split('.').next().unwrap_or_default();
        if filename_base.is_empty() {
            return Err(AppError::MalformedUrl(format!(
                "{}: filename has no stem",
                source_url
            )));
        }

        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
            .unwrap_or(DEFAULT_EXTENSION);

        Ok(Self {
            source_url: Some(source_url.to_string()),
            correlation_key: key.to_string(),
            face_discriminator: filename_base.rsplit('_').next().unwrap_or_default().to_string(),
            filename_base: filename_base.to_string(),
            original_filename: filename.to_string(),
            expected_result_filename: format!("{}{}.{}", filename_base, RESULT_SUFFIX, extension),
        })
    }

    /// Metadata for an image pushed directly rather than fetched from a URL
    pub fn for_upload(image_id: &str) -> Self {
        Self {
            source_url: None,
            correlation_key: image_id.to_string(),
            face_discriminator: String::new(),
            filename_base: image_id.to_string(),
            original_filename: format!("{}.{}", image_id, DEFAULT_EXTENSION),
            expected_result_filename: format!("{}{}.{}", image_id, RESULT_SUFFIX, DEFAULT_EXTENSION),
        }
    }
}
