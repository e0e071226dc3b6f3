//! Periodic best-effort track sync.
//!
//! On each tick, if the path grew since the last successful upload, the full
//! path, distance and elapsed time are sent. Sends run on their own task so a
//! slow network never delays fix processing, and failures are only logged:
//! the cursor stays put and the next tick tries again with the full path.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use tokio::task::JoinHandle;

use crate::api::{TrackPayload, WalkApi};
use crate::session::WalkSession;

pub struct TrackSync {
    api: Arc<dyn WalkApi>,
    synced_len: Arc<AtomicUsize>,
    in_flight: Arc<AtomicBool>,
}

impl TrackSync {
    pub fn new(api: Arc<dyn WalkApi>) -> Self {
        Self {
            api,
            synced_len: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of path points the server has acknowledged.
    pub fn synced_len(&self) -> usize {
        self.synced_len.load(Ordering::SeqCst)
    }

    /// Payload to send now, if any points are pending.
    pub fn pending(&self, session: &WalkSession, now: DateTime<Utc>) -> Option<TrackPayload> {
        if !session.is_active() || session.path().len() <= self.synced_len() {
            return None;
        }
        Some(TrackPayload {
            path: session.path().to_vec(),
            distance: session.distance_meters(),
            duration: session.elapsed_seconds(now),
        })
    }

    /// Run one sync step. Returns the spawned send, or `None` when there was
    /// nothing to send or a previous send is still running.
    pub fn tick(&self, session: &WalkSession, now: DateTime<Utc>) -> Option<JoinHandle<bool>> {
        let payload = self.pending(session, now)?;
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("[TrackSync] previous sync still in flight, skipping tick");
            return None;
        }

        let api = Arc::clone(&self.api);
        let synced_len = Arc::clone(&self.synced_len);
        let in_flight = Arc::clone(&self.in_flight);
        let walk_id = session.id().to_string();

        Some(tokio::spawn(async move {
            let len = payload.path.len();
            let ok = match api.update_track(&walk_id, &payload).await {
                Ok(()) => {
                    synced_len.fetch_max(len, Ordering::SeqCst);
                    debug!("[TrackSync] {} synced {} points", walk_id, len);
                    true
                }
                Err(err) => {
                    warn!("[TrackSync] {} sync failed, will retry: {}", walk_id, err);
                    false
                }
            };
            in_flight.store(false, Ordering::SeqCst);
            ok
        }))
    }
}
