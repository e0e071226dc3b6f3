//! Walk a simulated course through the full controller loop.
//!
//! Run with: cargo run --example walk_course

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use walk_tracker::{
    synthetic::{straight_course, SimulatedWalk},
    walk_channel, Course, DiaryEntry, GeoPoint, Marking, PresignedUpload, RecordingSurface,
    SimulatedPositionSource, TrackPayload, TrackingMode, WalkApi, WalkController, WalkEvent, WalkStatus,
};

/// Prints every call instead of talking to a server.
#[derive(Default)]
struct PrintingApi {
    syncs: Mutex<u32>,
}

#[async_trait]
impl WalkApi for PrintingApi {
    async fn start_walk(&self, course_id: Option<&str>) -> walk_tracker::Result<String> {
        println!("  api: start walk on course {:?}", course_id);
        Ok("demo-walk".to_string())
    }

    async fn update_track(&self, _walk_id: &str, track: &TrackPayload) -> walk_tracker::Result<()> {
        let mut syncs = self.syncs.lock().unwrap();
        *syncs += 1;
        println!("  api: sync #{} ({} points, {:.1}m)", syncs, track.path.len(), track.distance);
        Ok(())
    }

    async fn update_status(&self, _walk_id: &str, status: WalkStatus) -> walk_tracker::Result<()> {
        println!("  api: status {:?}", status);
        Ok(())
    }

    async fn end_walk(&self, _walk_id: &str, track: &TrackPayload) -> walk_tracker::Result<()> {
        println!("  api: end walk ({} points, {:.1}m, {}s)", track.path.len(), track.distance, track.duration);
        Ok(())
    }

    async fn submit_score(&self, _walk_id: &str, score: u32) -> walk_tracker::Result<()> {
        println!("  api: score {}", score);
        Ok(())
    }

    async fn save_diary(&self, _walk_id: &str, diary: &DiaryEntry) -> walk_tracker::Result<()> {
        println!("  api: diary {:?}", diary.title);
        Ok(())
    }

    async fn add_marking(&self, _walk_id: &str, marking: &Marking) -> walk_tracker::Result<()> {
        println!("  api: marking at {:.5}, {:.5}", marking.point.lat, marking.point.lng);
        Ok(())
    }

    async fn presigned_upload(&self, file_name: &str) -> walk_tracker::Result<PresignedUpload> {
        Ok(PresignedUpload {
            upload_url: format!("memory://upload/{}", file_name),
            public_url: format!("memory://public/{}", file_name),
        })
    }

    async fn upload(&self, upload_url: &str, bytes: Vec<u8>, _content_type: &str) -> walk_tracker::Result<()> {
        println!("  api: uploaded {} bytes to {}", bytes.len(), upload_url);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let course_path = straight_course(GeoPoint::new(37.5665, 126.978), 6, 30.0);
    let fixes = SimulatedWalk { step_meters: 4.0, noise_meters: 0.5, seed: 7 }.along(&course_path);
    println!("Walking a {} point course with {} fixes\n", course_path.len(), fixes.len());

    let mut controller = WalkController::new(std::sync::Arc::new(PrintingApi::default()), RecordingSurface::new())
        .with_mode(TrackingMode::Simulated);
    let mut events = controller.subscribe();

    controller
        .start(Some(Course { id: "course-1".to_string(), path: course_path }))
        .await
        .expect("start walk");

    let mut source = SimulatedPositionSource::new(fixes, Duration::from_millis(250));
    let (handle, commands) = walk_channel();

    let driver = async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.add_marking(None, None).await.expect("marking");
        tokio::time::sleep(Duration::from_secs(6)).await;
        handle.end().await.expect("end walk")
    };

    let (exit, summary) = tokio::join!(controller.run(&mut source, commands), driver);
    println!("\nLoop exited: {:?}", exit);

    while let Ok(event) = events.try_recv() {
        match event {
            WalkEvent::Progress { index, fraction } => println!("progress -> {} ({:.0}%)", index, fraction * 100.0),
            WalkEvent::CompletionPrompt(prompt) => {
                println!("completion prompt: {:.1}m from end", prompt.distance_to_end_meters)
            }
            WalkEvent::StatusChanged(status) => println!("status -> {:?}", status),
            WalkEvent::MarkingAdded { count } => println!("markings: {}", count),
            WalkEvent::Tracked(_) => {}
        }
    }

    println!(
        "\nSummary: {:.1}m, {} markings, image {:?}",
        summary.distance_meters, summary.marking_count, summary.path_image_url
    );
    controller.save_diary(Some("Morning loop".to_string()), 90).await.expect("diary");
}
