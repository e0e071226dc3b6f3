//! Walk session aggregate.
//!
//! A [`WalkSession`] owns everything one walk attempt mutates: the tracker
//! (path, distance, pause gate), the status, markings and pause bookkeeping.
//! It replaces ambient global state with a single value the controller holds.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::{TrackerConfig, TrackingMode};
use crate::tracker::{TrackUpdate, WalkTracker};
use crate::GeoPoint;

/// Server-side walk status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum WalkStatus {
    Started,
    Paused,
    Completed,
    Canceled,
    Abandoned,
}

impl WalkStatus {
    /// Started or paused; the walk can still change.
    pub fn is_active(self) -> bool {
        matches!(self, WalkStatus::Started | WalkStatus::Paused)
    }
}

/// A scent-marking event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marking {
    pub point: GeoPoint,
    pub photo_url: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Post-walk review data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkSummary {
    pub walk_id: String,
    pub distance_meters: f64,
    pub duration_seconds: u64,
    pub marking_count: u32,
    pub path: Vec<GeoPoint>,
    pub path_image_url: Option<String>,
}

/// Undo record for an optimistic pause toggle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[must_use = "commit or roll back the transition"]
pub struct PauseTransition {
    previous_status: WalkStatus,
    previous_paused_at: Option<DateTime<Utc>>,
    previous_paused_total: Duration,
    /// Status the toggle moved to
    pub status: WalkStatus,
}

#[derive(Debug, Clone)]
pub struct WalkSession {
    id: String,
    course_id: Option<String>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    status: WalkStatus,
    tracker: WalkTracker,
    markings: Vec<Marking>,
    paused_at: Option<DateTime<Utc>>,
    paused_total: Duration,
}

impl WalkSession {
    pub fn new(
        id: String,
        course_id: Option<String>,
        config: TrackerConfig,
        mode: TrackingMode,
        now: DateTime<Utc>,
    ) -> Self {
        info!("[WalkSession] started walk {} (course: {:?})", id, course_id);
        Self {
            id,
            course_id,
            started_at: now,
            ended_at: None,
            status: WalkStatus::Started,
            tracker: WalkTracker::new(config, mode),
            markings: Vec::new(),
            paused_at: None,
            paused_total: Duration::zero(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn course_id(&self) -> Option<&str> {
        self.course_id.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn status(&self) -> WalkStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_paused(&self) -> bool {
        self.tracker.is_paused()
    }

    pub fn path(&self) -> &[GeoPoint] {
        self.tracker.path()
    }

    pub fn distance_meters(&self) -> f64 {
        self.tracker.distance_meters()
    }

    pub fn marking_count(&self) -> u32 {
        self.markings.len() as u32
    }

    pub fn markings(&self) -> &[Marking] {
        &self.markings
    }

    pub fn tracker(&self) -> &WalkTracker {
        &self.tracker
    }

    /// Feed a fix. Ignored unless the walk is started and not paused.
    pub fn record_fix(&mut self, point: GeoPoint) -> Option<TrackUpdate> {
        if self.status != WalkStatus::Started {
            return None;
        }
        self.tracker.record(point)
    }

    pub fn add_marking(&mut self, marking: Marking) -> u32 {
        self.markings.push(marking);
        self.marking_count()
    }

    /// Walking time, excluding paused stretches.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let end = self.ended_at.unwrap_or(now);
        let current_pause = self.paused_at.map_or(Duration::zero(), |p| end - p);
        (end - self.started_at - self.paused_total - current_pause).max(Duration::zero())
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.elapsed(now).num_seconds().max(0) as u64
    }

    /// Flip pause locally, before the server has confirmed. Keep the returned
    /// transition and hand it to [`WalkSession::rollback`] if the server rejects.
    pub fn toggle_pause(&mut self, now: DateTime<Utc>) -> Option<PauseTransition> {
        let previous_status = self.status;
        let previous_paused_at = self.paused_at;
        let previous_paused_total = self.paused_total;

        let status = match self.status {
            WalkStatus::Started => {
                self.paused_at = Some(now);
                self.tracker.set_paused(true);
                WalkStatus::Paused
            }
            WalkStatus::Paused => {
                if let Some(paused_at) = self.paused_at.take() {
                    self.paused_total = self.paused_total + (now - paused_at);
                }
                self.tracker.set_paused(false);
                WalkStatus::Started
            }
            _ => return None,
        };
        self.status = status;
        debug!("[WalkSession] {} -> {:?} (optimistic)", self.id, status);

        Some(PauseTransition {
            previous_status,
            previous_paused_at,
            previous_paused_total,
            status,
        })
    }

    /// Compensate a rejected toggle.
    pub fn rollback(&mut self, transition: PauseTransition) {
        if self.status != transition.status {
            return;
        }
        self.status = transition.previous_status;
        self.paused_at = transition.previous_paused_at;
        self.paused_total = transition.previous_paused_total;
        self.tracker.set_paused(transition.previous_status == WalkStatus::Paused);
        info!("[WalkSession] {} rolled back to {:?}", self.id, self.status);
    }

    /// Move to a terminal status. Returns `false` if already finished.
    pub fn finish(&mut self, status: WalkStatus, now: DateTime<Utc>) -> bool {
        if !self.is_active() || status.is_active() {
            return false;
        }
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total = self.paused_total + (now - paused_at);
        }
        self.tracker.set_paused(true);
        self.ended_at = Some(now);
        self.status = status;
        info!(
            "[WalkSession] {} finished as {:?}: {:.0}m, {} markings",
            self.id,
            status,
            self.distance_meters(),
            self.marking_count()
        );
        true
    }

    pub fn summary(&self, now: DateTime<Utc>, path_image_url: Option<String>) -> WalkSummary {
        WalkSummary {
            walk_id: self.id.clone(),
            distance_meters: self.distance_meters(),
            duration_seconds: self.elapsed_seconds(now),
            marking_count: self.marking_count(),
            path: self.path().to_vec(),
            path_image_url,
        }
    }
}
