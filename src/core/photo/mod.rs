//! # Photo Module
//!
//! The engine's view of a photo: an immutable, already-normalized record
//! supplied by the caller. Identity is `id`; everything else is advisory
//! metadata used for narrowing or display.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Latitude/longitude pair attached to a photo
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// A photo selected by the user for a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoItem {
    /// Opaque identifier, unique within a scan
    pub id: String,
    /// Capture time in UTC
    pub create_time: DateTime<Utc>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub gps: Option<GpsLocation>,
    /// Remote location of the photo bytes. Without it the photo cannot be hashed.
    #[serde(default)]
    pub download_url: Option<String>,
    /// Display-only link back to the photo library
    #[serde(default)]
    pub deep_link: Option<String>,
}

impl PhotoItem {
    /// Create a photo with only the required fields set
    pub fn new(id: impl Into<String>, create_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            create_time,
            filename: None,
            mime_type: None,
            width: None,
            height: None,
            gps: None,
            download_url: None,
            deep_link: None,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    /// Both dimensions, if present and non-zero
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }

    /// Calendar day (UTC) the photo was taken
    pub fn capture_day(&self) -> NaiveDate {
        self.create_time.date_naive()
    }

    pub fn is_downloadable(&self) -> bool {
        self.download_url.is_some()
    }

    /// Canonical ordering used everywhere photos are listed: capture time, then id.
    pub fn chronological_cmp(&self, other: &PhotoItem) -> Ordering {
        self.create_time
            .cmp(&other.create_time)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Sort photos by `(create_time, id)` in place
pub fn sort_chronologically(photos: &mut [PhotoItem]) {
    photos.sort_by(|a, b| a.chronological_cmp(b));
}
