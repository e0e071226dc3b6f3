//! Walk controller flow: start, fixes, pause, markings, end and the run loop.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{north_line, Call, FakeApi};
use walk_tracker::{
    walk_channel, ChannelPositionSource, Course, Fix, GeoPoint, PhotoUpload, PositionError, ProgressOutcome,
    RecordingSurface, RunExit, WalkController, WalkError, WalkEvent, WalkStatus,
};

fn controller(api: &Arc<FakeApi>) -> WalkController<RecordingSurface> {
    WalkController::new(api.clone(), RecordingSurface::new())
}

fn course() -> Course {
    Course { id: "course-7".to_string(), path: north_line(10, 10.0) }
}

fn drain(events: &mut tokio::sync::mpsc::UnboundedReceiver<WalkEvent>) -> Vec<WalkEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn test_start_failure_is_returned_without_session() {
    let api = Arc::new(FakeApi::default());
    api.fail_start.store(true, Ordering::SeqCst);
    let mut controller = controller(&api);

    assert!(matches!(controller.start(None).await, Err(WalkError::Api { status: 500, .. })));
    assert!(controller.session().is_none());
    assert_eq!(api.calls(), vec![Call::Start(None)]);
}

#[tokio::test(start_paused = true)]
async fn test_start_draws_course_and_resets_previous_walk() {
    let api = Arc::new(FakeApi::default());
    let mut controller = controller(&api);

    controller.start(None).await.unwrap();
    for p in north_line(3, 5.0) {
        controller.handle_fix(Fix::new(p));
    }
    assert_eq!(controller.session().unwrap().path().len(), 3);

    controller.start(Some(course())).await.unwrap();
    let session = controller.session().unwrap();
    assert_eq!(session.course_id(), Some("course-7"));
    assert!(session.path().is_empty());
    assert_eq!(controller.matcher().unwrap().progress_index(), -1);

    let surface = controller.map().surface();
    assert_eq!(surface.reference.len(), 10);
    assert!(surface.live.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_restart_abandons_unfinished_walk() {
    let api = Arc::new(FakeApi::default());
    let mut controller = controller(&api);
    controller.start(None).await.unwrap();
    controller.handle_fix(Fix::new(north_line(1, 0.0)[0]));

    controller.start(None).await.unwrap();
    assert_eq!(
        api.calls(),
        vec![Call::Start(None), Call::Start(None), Call::Status(WalkStatus::Abandoned)]
    );
    assert_eq!(controller.session().unwrap().status(), WalkStatus::Started);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_end_sends_no_abandon() {
    let api = Arc::new(FakeApi::default());
    let mut controller = controller(&api);
    controller.start(None).await.unwrap();
    controller.end().await.unwrap();

    controller.start(None).await.unwrap();
    assert_eq!(api.count(|c| matches!(c, Call::Status(WalkStatus::Abandoned))), 0);
}

#[tokio::test(start_paused = true)]
async fn test_abandon_failure_does_not_block_restart() {
    let api = Arc::new(FakeApi::default());
    let mut controller = controller(&api);
    controller.start(None).await.unwrap();
    api.fail_status.store(true, Ordering::SeqCst);

    controller.start(None).await.unwrap();
    assert_eq!(api.count(|c| matches!(c, Call::Status(WalkStatus::Abandoned))), 1);
    assert!(controller.session().unwrap().is_active());
}

#[tokio::test(start_paused = true)]
async fn test_fixes_drive_tracker_progress_and_map() {
    let api = Arc::new(FakeApi::default());
    let mut controller = controller(&api);
    let mut events = controller.subscribe();
    let course = course();
    controller.start(Some(course.clone())).await.unwrap();

    let first = controller.handle_fix(Fix::new(course.path[0]));
    assert_eq!(first.progress, Some(ProgressOutcome::Advanced { index: 0 }));
    let outcome = controller.handle_fix(Fix::new(course.path[4]));
    assert!(outcome.update.is_some());
    assert_eq!(outcome.progress, Some(ProgressOutcome::Advanced { index: 4 }));
    assert!(outcome.completion.is_none());

    let surface = controller.map().surface();
    assert_eq!(surface.live.len(), 2);
    assert_eq!(surface.progress.len(), 5);
    assert_eq!(surface.position, Some(course.path[4]));

    let events = drain(&mut events);
    assert!(events.contains(&WalkEvent::StatusChanged(WalkStatus::Started)));
    assert!(events.iter().any(|e| matches!(e, WalkEvent::Progress { index: 4, .. })));
}

#[tokio::test(start_paused = true)]
async fn test_completion_prompt_emitted_once() {
    let api = Arc::new(FakeApi::default());
    let mut controller = controller(&api);
    let mut events = controller.subscribe();
    let course = course();
    controller.start(Some(course.clone())).await.unwrap();

    for p in &course.path {
        controller.handle_fix(Fix::new(*p));
    }
    let end = *course.path.last().unwrap();
    controller.handle_fix(Fix::new(end));
    controller.handle_fix(Fix::new(end));

    let prompts = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, WalkEvent::CompletionPrompt(_)))
        .count();
    assert_eq!(prompts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_pause_stops_distance_and_progress() {
    let api = Arc::new(FakeApi::default());
    let mut controller = controller(&api);
    let course = course();
    controller.start(Some(course.clone())).await.unwrap();
    controller.handle_fix(Fix::new(course.path[0]));
    controller.handle_fix(Fix::new(course.path[1]));

    assert_eq!(controller.toggle_pause().await.unwrap(), WalkStatus::Paused);
    for p in &course.path[2..6] {
        let outcome = controller.handle_fix(Fix::new(*p));
        assert!(outcome.update.is_none());
        assert!(outcome.progress.is_none());
    }
    assert_eq!(controller.session().unwrap().path().len(), 2);
    assert_eq!(controller.matcher().unwrap().progress_index(), 1);

    assert_eq!(controller.toggle_pause().await.unwrap(), WalkStatus::Started);
    assert!(controller.handle_fix(Fix::new(course.path[6])).update.is_some());
    assert_eq!(
        api.calls()[1..],
        [Call::Status(WalkStatus::Paused), Call::Status(WalkStatus::Started)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rejected_pause_rolls_back() {
    let api = Arc::new(FakeApi::default());
    let mut controller = controller(&api);
    let mut events = controller.subscribe();
    controller.start(None).await.unwrap();
    api.fail_status.store(true, Ordering::SeqCst);

    assert!(controller.toggle_pause().await.is_err());
    let session = controller.session().unwrap();
    assert_eq!(session.status(), WalkStatus::Started);
    assert!(!session.is_paused());
    assert!(!session.tracker().is_paused());

    let statuses: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            WalkEvent::StatusChanged(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec![WalkStatus::Started, WalkStatus::Paused, WalkStatus::Started]);

    // Fixes still count after the rollback
    for p in north_line(2, 5.0) {
        controller.handle_fix(Fix::new(p));
    }
    assert_eq!(controller.session().unwrap().path().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_marking_with_photo_uploads_first() {
    let api = Arc::new(FakeApi::default());
    let mut controller = controller(&api);
    controller.start(None).await.unwrap();
    let here = north_line(1, 0.0)[0];
    controller.handle_fix(Fix::new(here));

    let photo = PhotoUpload::jpeg("sniff.jpg", vec![0xFF, 0xD8, 0xFF]);
    assert_eq!(controller.add_marking(None, Some(photo)).await.unwrap(), 1);

    assert_eq!(
        api.calls()[1..],
        [
            Call::Presign("sniff.jpg".to_string()),
            Call::Upload { url: "https://upload.test/sniff.jpg".to_string(), bytes: 3 },
            Call::Marking { photo_url: Some("https://cdn.test/sniff.jpg".to_string()) },
        ]
    );
    let session = controller.session().unwrap();
    assert_eq!(session.markings()[0].point, here);
    assert_eq!(controller.map().surface().markings, vec![here]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_photo_upload_records_nothing() {
    let api = Arc::new(FakeApi::default());
    api.fail_upload.store(true, Ordering::SeqCst);
    let mut controller = controller(&api);
    controller.start(None).await.unwrap();

    let point = GeoPoint::new(37.5665, 126.978);
    let photo = PhotoUpload::jpeg("sniff.jpg", vec![1, 2, 3]);
    assert!(matches!(controller.add_marking(Some(point), Some(photo)).await, Err(WalkError::Upload(_))));
    assert_eq!(controller.session().unwrap().marking_count(), 0);
    assert_eq!(api.count(|c| matches!(c, Call::Marking { .. })), 0);
}

#[tokio::test(start_paused = true)]
async fn test_marking_needs_a_position() {
    let api = Arc::new(FakeApi::default());
    let mut controller = controller(&api);
    controller.start(None).await.unwrap();

    assert!(matches!(controller.add_marking(None, None).await, Err(WalkError::InvalidState(_))));
}

#[tokio::test(start_paused = true)]
async fn test_end_uploads_image_and_completes() {
    let api = Arc::new(FakeApi::default());
    let mut controller = controller(&api);
    controller.start(None).await.unwrap();
    for p in north_line(4, 10.0) {
        controller.handle_fix(Fix::new(p));
    }

    let summary = controller.end().await.unwrap();
    assert_eq!(summary.walk_id, "walk-1");
    assert_eq!(summary.path.len(), 4);
    assert!((summary.distance_meters - 30.0).abs() < 0.5);
    assert_eq!(summary.path_image_url.as_deref(), Some("https://cdn.test/walk-walk-1.png"));
    assert_eq!(controller.session().unwrap().status(), WalkStatus::Completed);
    assert!(controller.map().surface().chrome_visible);
    assert!(api.calls().contains(&Call::End { points: 4, distance: summary.distance_meters }));
}

#[tokio::test(start_paused = true)]
async fn test_failed_end_keeps_walk_active_for_retry() {
    let api = Arc::new(FakeApi::default());
    api.fail_end.store(true, Ordering::SeqCst);
    let mut controller = controller(&api);
    controller.start(None).await.unwrap();
    controller.handle_fix(Fix::new(north_line(1, 0.0)[0]));

    assert!(controller.end().await.is_err());
    assert_eq!(controller.session().unwrap().status(), WalkStatus::Started);
    assert!(controller.summary().is_none());

    api.fail_end.store(false, Ordering::SeqCst);
    controller.end().await.unwrap();
    // The image from the first attempt is reused
    assert_eq!(api.count(|c| matches!(c, Call::Presign(_))), 1);
    assert_eq!(api.count(|c| matches!(c, Call::End { .. })), 2);
}

#[tokio::test(start_paused = true)]
async fn test_end_with_empty_path_and_failing_snapshot() {
    let api = Arc::new(FakeApi::default());
    let mut controller = WalkController::new(api.clone(), RecordingSurface::failing());
    controller.start(None).await.unwrap();

    let summary = controller.end().await.unwrap();
    assert!(summary.path.is_empty());
    assert!(summary.path_image_url.is_some());
    assert!(controller.map().surface().chrome_visible);
}

#[tokio::test(start_paused = true)]
async fn test_image_upload_failure_does_not_block_end() {
    let api = Arc::new(FakeApi::default());
    api.fail_upload.store(true, Ordering::SeqCst);
    let mut controller = controller(&api);
    controller.start(None).await.unwrap();

    let summary = controller.end().await.unwrap();
    assert!(summary.path_image_url.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_is_best_effort() {
    let api = Arc::new(FakeApi::default());
    api.fail_status.store(true, Ordering::SeqCst);
    let mut controller = controller(&api);
    controller.start(None).await.unwrap();

    controller.cancel().await.unwrap();
    assert_eq!(controller.session().unwrap().status(), WalkStatus::Canceled);
    assert!(matches!(controller.cancel().await, Err(WalkError::InvalidState(_))));
}

#[tokio::test(start_paused = true)]
async fn test_save_diary_after_end() {
    let api = Arc::new(FakeApi::default());
    let mut controller = controller(&api);
    controller.start(None).await.unwrap();
    assert!(matches!(controller.save_diary(None, 80).await, Err(WalkError::InvalidState(_))));

    controller.end().await.unwrap();
    controller.save_diary(Some("Park loop".to_string()), 80).await.unwrap();

    let calls = api.calls();
    let score_at = calls.iter().position(|c| *c == Call::Score(80)).unwrap();
    match &calls[score_at + 1] {
        Call::Diary(diary) => {
            assert_eq!(diary.title.as_deref(), Some("Park loop"));
            assert_eq!(diary.score, 80);
            assert_eq!(diary.path_image_url.as_deref(), Some("https://cdn.test/walk-walk-1.png"));
        }
        other => panic!("expected diary after score, got {:?}", other),
    }
}

// ============================================================================
// Run loop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_run_requires_active_walk() {
    let api = Arc::new(FakeApi::default());
    let mut controller = controller(&api);
    let (mut source, _feed) = ChannelPositionSource::new();
    let (_handle, commands) = walk_channel();

    assert!(matches!(
        controller.run(&mut source, commands).await,
        Err(WalkError::NoActiveSession)
    ));
    assert_eq!(source.active_watches(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_processes_fixes_syncs_and_ends() {
    let api = Arc::new(FakeApi::default());
    let mut controller = controller(&api);
    controller.start(None).await.unwrap();

    let (mut source, feed) = ChannelPositionSource::new();
    let watches = source.clone();
    let (handle, commands) = walk_channel();

    let driver = async {
        tokio::task::yield_now().await;
        assert_eq!(watches.active_watches(), 1);
        for p in north_line(5, 10.0) {
            assert!(feed.push(p));
        }
        feed.push_error(PositionError::Timeout);

        // Past one sync interval
        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert_eq!(handle.toggle_pause().await.unwrap(), WalkStatus::Paused);
        assert_eq!(handle.toggle_pause().await.unwrap(), WalkStatus::Started);
        handle.end().await.unwrap()
    };

    let (exit, summary) = tokio::join!(controller.run(&mut source, commands), driver);
    assert_eq!(exit.unwrap(), RunExit::Ended);
    assert_eq!(summary.path.len(), 5);

    // Watch released once the loop exits
    assert_eq!(source.active_watches(), 0);
    assert!(!feed.push(GeoPoint::new(37.6, 127.0)));
    assert!(api.calls().contains(&Call::Track { points: 5 }));
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_when_handles_dropped() {
    let api = Arc::new(FakeApi::default());
    let mut controller = controller(&api);
    controller.start(None).await.unwrap();

    let (mut source, _feed) = ChannelPositionSource::new();
    let (handle, commands) = walk_channel();
    drop(handle);

    assert_eq!(controller.run(&mut source, commands).await.unwrap(), RunExit::Detached);
    assert_eq!(source.active_watches(), 0);
    assert!(controller.session().unwrap().is_active());
}

#[tokio::test(start_paused = true)]
async fn test_run_cancel_exits_loop() {
    let api = Arc::new(FakeApi::default());
    let mut controller = controller(&api);
    controller.start(None).await.unwrap();

    let (mut source, _feed) = ChannelPositionSource::new();
    let (handle, commands) = walk_channel();

    let (exit, canceled) = tokio::join!(controller.run(&mut source, commands), handle.cancel());
    assert_eq!(exit.unwrap(), RunExit::Canceled);
    assert!(canceled.is_ok());
    assert!(matches!(handle.cancel().await, Err(WalkError::NoActiveSession)));
}
