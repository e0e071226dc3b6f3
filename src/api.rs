//! Remote walk API contract.
//!
//! [`WalkApi`] is what the controller and the sync loop talk to. The
//! reqwest-backed implementation lives in [`crate::http`]; tests use fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{Marking, WalkStatus};
use crate::GeoPoint;

/// Body of `PATCH /walks/{id}/track`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPayload {
    pub path: Vec<GeoPoint>,
    pub distance: f64,
    /// Seconds
    pub duration: u64,
}

/// Body of `POST /walks/{id}/diary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_image_url: Option<String>,
    pub distance: f64,
    pub marking_count: u32,
    pub score: u32,
}

/// Result of asking the server for an upload slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUpload {
    /// Where to PUT the bytes
    pub upload_url: String,
    /// Where the file is served from afterwards
    pub public_url: String,
}

/// A photo to attach to a marking.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    pub fn jpeg(file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            content_type: "image/jpeg".to_string(),
            bytes,
        }
    }

    pub fn png(file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            content_type: "image/png".to_string(),
            bytes,
        }
    }
}

#[async_trait]
pub trait WalkApi: Send + Sync {
    /// Create a walk session, optionally along an existing course. Returns the walk id.
    async fn start_walk(&self, course_id: Option<&str>) -> Result<String>;

    /// Best-effort intermediate track upload.
    async fn update_track(&self, walk_id: &str, track: &TrackPayload) -> Result<()>;

    async fn update_status(&self, walk_id: &str, status: WalkStatus) -> Result<()>;

    /// Authoritative finalize.
    async fn end_walk(&self, walk_id: &str, track: &TrackPayload) -> Result<()>;

    async fn submit_score(&self, walk_id: &str, tailcopter_score: u32) -> Result<()>;

    async fn save_diary(&self, walk_id: &str, diary: &DiaryEntry) -> Result<()>;

    async fn add_marking(&self, walk_id: &str, marking: &Marking) -> Result<()>;

    async fn presigned_upload(&self, file_name: &str) -> Result<PresignedUpload>;

    /// PUT raw bytes to a presigned URL.
    async fn upload(&self, upload_url: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Presign, upload, and return the public URL.
    async fn upload_file(&self, photo: PhotoUpload) -> Result<String> {
        let slot = self.presigned_upload(&photo.file_name).await?;
        self.upload(&slot.upload_url, photo.bytes, &photo.content_type).await?;
        Ok(slot.public_url)
    }
}
