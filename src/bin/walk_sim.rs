//! walk-sim - simulate walks through the tracker and progress matcher
//!
//! Usage:
//!   walk-sim course [--points 10] [--spacing 40] [--noise 2] [--png out.png]
//!   walk-sim wander [--steps 200] [--png out.png]
//!
//! Prints accepted distance, progress index and the completion prompt, and
//! optionally writes the fallback path image.

use clap::{Parser, Subcommand};
use log::{info, warn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walk_tracker::{
    render_path_png,
    synthetic::{straight_course, SimulatedWalk},
    GeoPoint, MapConfig, ProgressConfig, ProgressMatcher, ProgressOutcome, TrackerConfig, TrackingMode,
    WalkTracker,
};

#[derive(Parser)]
#[command(name = "walk-sim")]
#[command(about = "Simulate GPS walks through the walk tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Starting latitude
    #[arg(long, global = true, default_value = "37.5665")]
    lat: f64,

    /// Starting longitude
    #[arg(long, global = true, default_value = "126.978")]
    lng: f64,

    /// RNG seed
    #[arg(long, global = true, default_value = "42")]
    seed: u64,

    /// Use the live (1 m) jitter threshold instead of the simulated one
    #[arg(long, global = true)]
    live: bool,

    /// Write the rendered path to this PNG file
    #[arg(long, global = true)]
    png: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk along a straight course and report progress
    Course {
        /// Number of course points
        #[arg(long, default_value = "10")]
        points: usize,

        /// Spacing between course points in meters
        #[arg(long, default_value = "40")]
        spacing: f64,

        /// Distance between fixes in meters
        #[arg(long, default_value = "3")]
        step: f64,

        /// GPS noise radius in meters
        #[arg(long, default_value = "0")]
        noise: f64,
    },

    /// Free random walk without a course
    Wander {
        /// Number of fixes
        #[arg(long, default_value = "200")]
        steps: usize,

        /// Distance between fixes in meters
        #[arg(long, default_value = "3")]
        step: f64,

        /// GPS noise radius in meters
        #[arg(long, default_value = "0")]
        noise: f64,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let origin = GeoPoint::new(cli.lat, cli.lng);
    if !origin.is_fix() {
        eprintln!("Invalid starting point: {}, {}", cli.lat, cli.lng);
        std::process::exit(2);
    }
    let mode = if cli.live { TrackingMode::Live } else { TrackingMode::Simulated };
    let mut tracker = WalkTracker::new(TrackerConfig::default(), mode);

    match cli.command {
        Commands::Course { points, spacing, step, noise } => {
            let course = straight_course(origin, points, spacing);
            let walk = SimulatedWalk { step_meters: step, noise_meters: noise, seed: cli.seed };
            let mut matcher = ProgressMatcher::new(course.clone(), ProgressConfig::default());

            println!(
                "Course: {} points, {:.1}m (matching {})",
                course.len(),
                matcher.reference_meters(),
                if matcher.is_enabled() { "enabled" } else { "disabled" }
            );

            for (i, fix) in walk.along(&course).iter().enumerate() {
                tracker.record(*fix);
                if let ProgressOutcome::Advanced { index } = matcher.update(fix) {
                    info!("fix #{}: progress index {} ({:.0}%)", i, index, matcher.fraction() * 100.0);
                }
                if let Some(prompt) = matcher.check_completion(fix, tracker.distance_meters()) {
                    println!(
                        "Completion prompt at fix #{}: {:.1}m from end, walked {:.1}m of {:.1}m",
                        i, prompt.distance_to_end_meters, prompt.walked_meters, prompt.course_meters
                    );
                }
            }

            println!("Progress index: {}", matcher.progress_index());
            println!("Remaining: {:.1}m", matcher.remaining_meters());
        }
        Commands::Wander { steps, step, noise } => {
            let walk = SimulatedWalk { step_meters: step, noise_meters: noise, seed: cli.seed };
            for fix in walk.wander(origin, steps) {
                tracker.record(fix);
            }
        }
    }

    println!(
        "Walked {:.1}m, {} recorded points ({} threshold {:.1}m)",
        tracker.distance_meters(),
        tracker.path().len(),
        if cli.live { "live" } else { "simulated" },
        tracker.min_segment_meters()
    );

    if let Some(path) = cli.png {
        write_png(&path, tracker.path());
    }
}

fn write_png(path: &Path, points: &[GeoPoint]) {
    match render_path_png(points, &MapConfig::default()) {
        Ok(image) => match fs::write(path, &image.png) {
            Ok(()) => println!("Wrote {}x{} path image to {}", image.width, image.height, path.display()),
            Err(err) => {
                eprintln!("Failed to write {}: {}", path.display(), err);
                std::process::exit(1);
            }
        },
        Err(err) => {
            warn!("path render failed: {}", err);
            std::process::exit(1);
        }
    }
}
