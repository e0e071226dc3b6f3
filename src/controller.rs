//! The walk flow.
//!
//! [`WalkController`] is the single owner of the active walk: session,
//! progress matcher, sync cursor and map overlays. Hosts either call its
//! methods directly or hand it to [`WalkController::run`], which drives it
//! from a position watch, the sync interval and a command channel
//! ([`WalkHandle`]) until the walk ends or the host goes away.
//!
//! Failure policy:
//! - start / end: returned to the caller, never retried here
//! - pause toggles: applied optimistically, rolled back if the server rejects
//! - periodic sync, path image upload, abandoning a replaced walk, position
//!   errors: logged and swallowed

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::{DiaryEntry, PhotoUpload, TrackPayload, WalkApi};
use crate::config::{MapConfig, ProgressConfig, SyncConfig, TrackerConfig, TrackingMode};
use crate::error::{OptionExt, Result, WalkError};
use crate::map::{MapRenderAdapter, MapSurface};
use crate::position::{Fix, PositionSource};
use crate::progress::{CompletionPrompt, ProgressMatcher, ProgressOutcome};
use crate::session::{Marking, WalkSession, WalkStatus, WalkSummary};
use crate::sync::TrackSync;
use crate::tracker::TrackUpdate;
use crate::GeoPoint;

/// An existing course to walk along.
#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub id: String,
    pub path: Vec<GeoPoint>,
}

/// Notifications for the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum WalkEvent {
    Tracked(TrackUpdate),
    Progress { index: usize, fraction: f64 },
    CompletionPrompt(CompletionPrompt),
    MarkingAdded { count: u32 },
    StatusChanged(WalkStatus),
}

/// What one fix did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixOutcome {
    pub update: Option<TrackUpdate>,
    pub progress: Option<ProgressOutcome>,
    pub completion: Option<CompletionPrompt>,
}

/// Why [`WalkController::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Ended,
    Canceled,
    /// Every [`WalkHandle`] was dropped (the walk view went away).
    Detached,
}

struct ActiveWalk {
    session: WalkSession,
    matcher: Option<ProgressMatcher>,
    sync: TrackSync,
    path_image_url: Option<String>,
}

pub struct WalkController<S: MapSurface> {
    api: Arc<dyn WalkApi>,
    map: MapRenderAdapter<S>,
    mode: TrackingMode,
    tracker_config: TrackerConfig,
    progress_config: ProgressConfig,
    sync_config: SyncConfig,
    active: Option<ActiveWalk>,
    summary: Option<WalkSummary>,
    listeners: Vec<mpsc::UnboundedSender<WalkEvent>>,
}

impl<S: MapSurface> WalkController<S> {
    pub fn new(api: Arc<dyn WalkApi>, surface: S) -> Self {
        Self {
            api,
            map: MapRenderAdapter::new(surface, MapConfig::default()),
            mode: TrackingMode::Live,
            tracker_config: TrackerConfig::default(),
            progress_config: ProgressConfig::default(),
            sync_config: SyncConfig::default(),
            active: None,
            summary: None,
            listeners: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: TrackingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_tracker_config(mut self, config: TrackerConfig) -> Self {
        self.tracker_config = config;
        self
    }

    pub fn with_progress_config(mut self, config: ProgressConfig) -> Self {
        self.progress_config = config;
        self
    }

    pub fn with_sync_config(mut self, config: SyncConfig) -> Self {
        self.sync_config = config;
        self
    }

    pub fn with_map_config(mut self, config: MapConfig) -> Self {
        let surface = self.map.into_surface();
        self.map = MapRenderAdapter::new(surface, config);
        self
    }

    /// Receive [`WalkEvent`]s from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<WalkEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push(tx);
        rx
    }

    pub fn session(&self) -> Option<&WalkSession> {
        self.active.as_ref().map(|a| &a.session)
    }

    pub fn matcher(&self) -> Option<&ProgressMatcher> {
        self.active.as_ref().and_then(|a| a.matcher.as_ref())
    }

    pub fn track_sync(&self) -> Option<&TrackSync> {
        self.active.as_ref().map(|a| &a.sync)
    }

    pub fn summary(&self) -> Option<&WalkSummary> {
        self.summary.as_ref()
    }

    pub fn map(&self) -> &MapRenderAdapter<S> {
        &self.map
    }

    fn emit(&mut self, event: WalkEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn active_mut(&mut self) -> Result<&mut ActiveWalk> {
        self.active.as_mut().ok_or_no_session()
    }

    /// Start a new walk, replacing any previous one.
    pub async fn start(&mut self, course: Option<Course>) -> Result<&WalkSession> {
        let course_id = course.as_ref().map(|c| c.id.clone());
        let walk_id = match self.api.start_walk(course_id.as_deref()).await {
            Ok(id) => id,
            Err(err) => {
                warn!("[WalkController] failed to start walk: {}", err);
                return Err(err);
            }
        };

        if let Some(mut previous) = self.active.take() {
            let previous_id = previous.session.id().to_string();
            if previous.session.finish(WalkStatus::Abandoned, Utc::now()) {
                info!("[WalkController] abandoning unfinished walk {}", previous_id);
                if let Err(err) = self.api.update_status(&previous_id, WalkStatus::Abandoned).await {
                    warn!("[WalkController] abandon not acknowledged for {}: {}", previous_id, err);
                }
            } else {
                debug!("[WalkController] replacing walk {}", previous_id);
            }
        }
        self.summary = None;
        self.map.reset();

        let matcher = course.map(|c| {
            self.map.show_course(&c.path);
            ProgressMatcher::new(c.path, self.progress_config.clone())
        });
        let session = WalkSession::new(
            walk_id,
            course_id,
            self.tracker_config.clone(),
            self.mode,
            Utc::now(),
        );

        self.active = Some(ActiveWalk {
            session,
            matcher,
            sync: TrackSync::new(Arc::clone(&self.api)),
            path_image_url: None,
        });
        self.emit(WalkEvent::StatusChanged(WalkStatus::Started));

        self.session().ok_or_no_session()
    }

    /// Process one position sample.
    pub fn handle_fix(&mut self, fix: Fix) -> FixOutcome {
        let point = fix.point;
        let mut outcome = FixOutcome::default();
        let Some(active) = self.active.as_mut() else {
            return outcome;
        };
        if !point.is_fix() || !active.session.is_active() {
            return outcome;
        }

        self.map.show_position(point);
        if active.session.is_paused() {
            return outcome;
        }

        let mut events = Vec::new();

        outcome.update = active.session.record_fix(point);
        if let Some(update) = outcome.update {
            self.map.show_live_path(active.session.path());
            events.push(WalkEvent::Tracked(update));
        }

        if let Some(matcher) = active.matcher.as_mut() {
            let progress = matcher.update(&point);
            if let ProgressOutcome::Advanced { index } = progress {
                self.map.show_progress(matcher.completed_path());
                events.push(WalkEvent::Progress { index, fraction: matcher.fraction() });
            }
            outcome.progress = Some(progress);

            outcome.completion = matcher.check_completion(&point, active.session.distance_meters());
            if let Some(prompt) = outcome.completion {
                events.push(WalkEvent::CompletionPrompt(prompt));
            }
        }

        for event in events {
            self.emit(event);
        }
        outcome
    }

    /// Pause or resume. The local state flips immediately and is rolled back
    /// if the server call fails.
    pub async fn toggle_pause(&mut self) -> Result<WalkStatus> {
        let api = Arc::clone(&self.api);
        let active = self.active_mut()?;
        let transition = active
            .session
            .toggle_pause(Utc::now())
            .ok_or_else(|| WalkError::InvalidState(format!("cannot pause a {:?} walk", active.session.status())))?;
        let walk_id = active.session.id().to_string();
        self.emit(WalkEvent::StatusChanged(transition.status));

        match api.update_status(&walk_id, transition.status).await {
            Ok(()) => Ok(transition.status),
            Err(err) => {
                warn!("[WalkController] status change rejected, rolling back: {}", err);
                let active = self.active_mut()?;
                active.session.rollback(transition);
                let status = active.session.status();
                self.emit(WalkEvent::StatusChanged(status));
                Err(err)
            }
        }
    }

    /// Record a scent-marking at `point` (or the last recorded position),
    /// uploading `photo` first when given.
    pub async fn add_marking(&mut self, point: Option<GeoPoint>, photo: Option<PhotoUpload>) -> Result<u32> {
        let api = Arc::clone(&self.api);
        let active = self.active_mut()?;
        if !active.session.is_active() {
            return Err(WalkError::InvalidState("walk already finished".to_string()));
        }
        let point = point
            .or_else(|| active.session.tracker().last_point())
            .ok_or_else(|| WalkError::InvalidState("no position for marking yet".to_string()))?;
        let walk_id = active.session.id().to_string();

        let photo_url = match photo {
            Some(photo) => Some(api.upload_file(photo).await?),
            None => None,
        };
        let marking = Marking { point, photo_url, recorded_at: Utc::now() };
        api.add_marking(&walk_id, &marking).await?;

        let count = self.active_mut()?.session.add_marking(marking);
        self.map.show_marking(count - 1, point);
        self.emit(WalkEvent::MarkingAdded { count });
        Ok(count)
    }

    /// One periodic sync step.
    pub fn sync_tick(&self) -> Option<JoinHandle<bool>> {
        let active = self.active.as_ref()?;
        active.sync.tick(&active.session, Utc::now())
    }

    /// Finalize the walk. A failed end call leaves the walk active so the
    /// user can retry.
    pub async fn end(&mut self) -> Result<WalkSummary> {
        let api = Arc::clone(&self.api);
        let Some(active) = self.active.as_mut() else {
            return Err(WalkError::NoActiveSession);
        };
        if !active.session.is_active() {
            return Err(WalkError::InvalidState("walk already finished".to_string()));
        }
        let walk_id = active.session.id().to_string();

        if active.path_image_url.is_none() {
            if let Some(image) = self.map.capture(active.session.path()).await {
                let photo = PhotoUpload::png(&format!("walk-{}.png", walk_id), image.png);
                match api.upload_file(photo).await {
                    Ok(url) => active.path_image_url = Some(url),
                    Err(err) => warn!("[WalkController] path image upload failed: {}", err),
                }
            }
        }

        let now = Utc::now();
        let track = TrackPayload {
            path: active.session.path().to_vec(),
            distance: active.session.distance_meters(),
            duration: active.session.elapsed_seconds(now),
        };
        if let Err(err) = api.end_walk(&walk_id, &track).await {
            warn!("[WalkController] failed to end walk {}: {}", walk_id, err);
            return Err(err);
        }

        active.session.finish(WalkStatus::Completed, now);
        let summary = active.session.summary(now, active.path_image_url.clone());
        info!(
            "[WalkController] walk {} ended: {:.0}m in {}s",
            walk_id, summary.distance_meters, summary.duration_seconds
        );
        self.summary = Some(summary.clone());
        self.emit(WalkEvent::StatusChanged(WalkStatus::Completed));
        Ok(summary)
    }

    /// Cancel the walk. The server is told on a best-effort basis.
    pub async fn cancel(&mut self) -> Result<()> {
        let api = Arc::clone(&self.api);
        let active = self.active_mut()?;
        if !active.session.finish(WalkStatus::Canceled, Utc::now()) {
            return Err(WalkError::InvalidState("walk already finished".to_string()));
        }
        let walk_id = active.session.id().to_string();
        if let Err(err) = api.update_status(&walk_id, WalkStatus::Canceled).await {
            warn!("[WalkController] cancel not acknowledged for {}: {}", walk_id, err);
        }
        self.emit(WalkEvent::StatusChanged(WalkStatus::Canceled));
        Ok(())
    }

    /// Submit the tailcopter score and save the ended walk as a diary entry.
    pub async fn save_diary(&mut self, title: Option<String>, score: u32) -> Result<()> {
        let summary = self
            .summary
            .as_ref()
            .ok_or_else(|| WalkError::InvalidState("walk has not ended".to_string()))?;

        self.api.submit_score(&summary.walk_id, score).await?;
        let diary = DiaryEntry {
            title,
            path_image_url: summary.path_image_url.clone(),
            distance: summary.distance_meters,
            marking_count: summary.marking_count,
            score,
        };
        self.api.save_diary(&summary.walk_id, &diary).await
    }

    /// Drive the active walk until it ends, is canceled, or every handle is
    /// dropped. The position watch and the sync interval are released on
    /// every exit path.
    pub async fn run<P: PositionSource>(&mut self, source: &mut P, mut commands: WalkCommands) -> Result<RunExit> {
        if !self.session().map_or(false, |s| s.is_active()) {
            return Err(WalkError::NoActiveSession);
        }

        let (tx, mut fixes) = mpsc::unbounded_channel();
        let _watch = source.watch(tx)?;
        let mut fixes_open = true;

        let mut ticker = tokio::time::interval(self.sync_config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.reset();

        loop {
            tokio::select! {
                reading = fixes.recv(), if fixes_open => match reading {
                    Some(Ok(fix)) => {
                        self.handle_fix(fix);
                    }
                    Some(Err(err)) => debug!("[WalkController] position error ignored: {}", err),
                    None => {
                        debug!("[WalkController] position source closed");
                        fixes_open = false;
                    }
                },
                _ = ticker.tick() => {
                    self.sync_tick();
                }
                command = commands.0.recv() => match command {
                    Some(WalkCommand::TogglePause { respond_to }) => {
                        let _ = respond_to.send(self.toggle_pause().await);
                    }
                    Some(WalkCommand::AddMarking { point, photo, respond_to }) => {
                        let _ = respond_to.send(self.add_marking(point, photo).await);
                    }
                    Some(WalkCommand::End { respond_to }) => {
                        let result = self.end().await;
                        let ended = result.is_ok();
                        let _ = respond_to.send(result);
                        if ended {
                            return Ok(RunExit::Ended);
                        }
                    }
                    Some(WalkCommand::Cancel { respond_to }) => {
                        let result = self.cancel().await;
                        let canceled = result.is_ok();
                        let _ = respond_to.send(result);
                        if canceled {
                            return Ok(RunExit::Canceled);
                        }
                    }
                    None => {
                        info!("[WalkController] all handles dropped, stopping walk loop");
                        return Ok(RunExit::Detached);
                    }
                },
            }
        }
    }
}

// ============================================================================
// Command channel
// ============================================================================

pub enum WalkCommand {
    TogglePause {
        respond_to: oneshot::Sender<Result<WalkStatus>>,
    },
    AddMarking {
        point: Option<GeoPoint>,
        photo: Option<PhotoUpload>,
        respond_to: oneshot::Sender<Result<u32>>,
    },
    End {
        respond_to: oneshot::Sender<Result<WalkSummary>>,
    },
    Cancel {
        respond_to: oneshot::Sender<Result<()>>,
    },
}

/// Receiving side, consumed by [`WalkController::run`].
pub struct WalkCommands(mpsc::UnboundedReceiver<WalkCommand>);

/// UI-side handle to a running walk loop.
#[derive(Clone)]
pub struct WalkHandle {
    tx: mpsc::UnboundedSender<WalkCommand>,
}

/// Create a connected handle / command pair.
pub fn walk_channel() -> (WalkHandle, WalkCommands) {
    let (tx, rx) = mpsc::unbounded_channel();
    (WalkHandle { tx }, WalkCommands(rx))
}

impl WalkHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<Result<T>>) -> WalkCommand) -> Result<T> {
        let (respond_to, response) = oneshot::channel();
        self.tx
            .send(build(respond_to))
            .map_err(|_| WalkError::NoActiveSession)?;
        response.await.map_err(|_| WalkError::NoActiveSession)?
    }

    pub async fn toggle_pause(&self) -> Result<WalkStatus> {
        self.request(|respond_to| WalkCommand::TogglePause { respond_to }).await
    }

    pub async fn add_marking(&self, point: Option<GeoPoint>, photo: Option<PhotoUpload>) -> Result<u32> {
        self.request(|respond_to| WalkCommand::AddMarking { point, photo, respond_to }).await
    }

    pub async fn end(&self) -> Result<WalkSummary> {
        self.request(|respond_to| WalkCommand::End { respond_to }).await
    }

    pub async fn cancel(&self) -> Result<()> {
        self.request(|respond_to| WalkCommand::Cancel { respond_to }).await
    }
}
