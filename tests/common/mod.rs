//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use walk_tracker::{DiaryEntry, GeoPoint, Marking, PresignedUpload, Result, TrackPayload, WalkApi, WalkError, WalkStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Start(Option<String>),
    Track { points: usize },
    Status(WalkStatus),
    End { points: usize, distance: f64 },
    Score(u32),
    Diary(DiaryEntry),
    Marking { photo_url: Option<String> },
    Presign(String),
    Upload { url: String, bytes: usize },
}

/// In-memory [`WalkApi`] that records calls and fails on request.
#[derive(Default)]
pub struct FakeApi {
    pub calls: Mutex<Vec<Call>>,
    /// Number of upcoming `update_track` calls that fail
    pub track_failures: AtomicU32,
    pub fail_start: AtomicBool,
    pub fail_status: AtomicBool,
    pub fail_end: AtomicBool,
    pub fail_upload: AtomicBool,
}

impl FakeApi {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn server_error(path: &str) -> WalkError {
        WalkError::Api { status: 500, url: path.to_string(), body: "unavailable".to_string() }
    }
}

#[async_trait]
impl WalkApi for FakeApi {
    async fn start_walk(&self, course_id: Option<&str>) -> Result<String> {
        self.record(Call::Start(course_id.map(str::to_string)));
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Self::server_error("/walks"));
        }
        Ok("walk-1".to_string())
    }

    async fn update_track(&self, _walk_id: &str, track: &TrackPayload) -> Result<()> {
        self.record(Call::Track { points: track.path.len() });
        let remaining = self.track_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.track_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Self::server_error("/walks/walk-1/track"));
        }
        Ok(())
    }

    async fn update_status(&self, _walk_id: &str, status: WalkStatus) -> Result<()> {
        self.record(Call::Status(status));
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(Self::server_error("/walks/walk-1/status"));
        }
        Ok(())
    }

    async fn end_walk(&self, _walk_id: &str, track: &TrackPayload) -> Result<()> {
        self.record(Call::End { points: track.path.len(), distance: track.distance });
        if self.fail_end.load(Ordering::SeqCst) {
            return Err(Self::server_error("/walks/walk-1/end"));
        }
        Ok(())
    }

    async fn submit_score(&self, _walk_id: &str, score: u32) -> Result<()> {
        self.record(Call::Score(score));
        Ok(())
    }

    async fn save_diary(&self, _walk_id: &str, diary: &DiaryEntry) -> Result<()> {
        self.record(Call::Diary(diary.clone()));
        Ok(())
    }

    async fn add_marking(&self, _walk_id: &str, marking: &Marking) -> Result<()> {
        self.record(Call::Marking { photo_url: marking.photo_url.clone() });
        Ok(())
    }

    async fn presigned_upload(&self, file_name: &str) -> Result<PresignedUpload> {
        self.record(Call::Presign(file_name.to_string()));
        Ok(PresignedUpload {
            upload_url: format!("https://upload.test/{}", file_name),
            public_url: format!("https://cdn.test/{}", file_name),
        })
    }

    async fn upload(&self, upload_url: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        self.record(Call::Upload { url: upload_url.to_string(), bytes: bytes.len() });
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(WalkError::Upload("PUT returned 503".to_string()));
        }
        Ok(())
    }
}

/// Points heading north from Seoul, `spacing` meters apart.
pub fn north_line(count: usize, spacing: f64) -> Vec<GeoPoint> {
    walk_tracker::synthetic::straight_course(GeoPoint::new(37.5665, 126.978), count, spacing)
}
