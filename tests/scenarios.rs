use std::sync::Arc;
use std::time::Duration;

use servo_infra::arbiter::Behavior;
use servo_infra::link::RecordingLink;
use servo_infra::servo::Band;
use servo_infra::{Command, DetectionResult, MotionConfig, MotionController, Rect, VehicleLink, Verb};

fn setup(config: MotionConfig) -> (Arc<RecordingLink>, MotionController<RecordingLink>) {
    let link = Arc::new(RecordingLink::new());
    let controller = MotionController::new(Arc::clone(&link), config);
    (link, controller)
}

fn marker(label: &str) -> DetectionResult {
    DetectionResult::single(Rect::new(400, 300, 600, 500), label)
}

#[tokio::test(start_paused = true)]
async fn search_then_follow() {
    let (link, mut controller) = setup(MotionConfig::default());

    for _ in 0..3 {
        let report = controller.tick(DetectionResult::none()).await;
        assert_eq!(report.behavior, Behavior::Searching);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(controller.is_searching());
    assert_eq!(link.sent(), vec!["cw 20"]);

    let report = controller
        .tick(DetectionResult::single(Rect::new(400, 300, 600, 500), "follow"))
        .await;
    assert!(!controller.is_searching());
    assert_eq!(report.behavior, Behavior::Tracking);

    let servo = report.servo.expect("servo output");
    assert_eq!(servo.area, 40_000);
    assert_eq!(servo.band, Band::InBand);
    assert_eq!(servo.speed_fb, 0);
    assert_eq!(servo.speed_yaw, 6);
    assert_eq!(servo.speed_ud, -12);
    assert_eq!(report.sent, Some(Command::follow(0, 0, -12, 6)));

    let overlay = report.overlay.expect("overlay");
    assert_eq!(overlay.tracking_line, Some(((480, 360), (500, 400))));

    // nothing more from the cancelled sweep
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(link.sent(), vec!["cw 20", "rc 0 0 -12 6"]);
}

#[tokio::test(start_paused = true)]
async fn held_forward_marker_is_debounced() {
    let (_link, mut controller) = setup(MotionConfig::default());

    let mut enqueued_at = Vec::new();
    for second in 0..20 {
        let report = controller.tick(marker("forward")).await;
        if let Some(cmd) = report.enqueued {
            assert_eq!(cmd, Command::step(Verb::Forward, 50));
            enqueued_at.push(second);
        }
        tokio::time::advance(Duration::from_secs(1)).await;
    }

    assert_eq!(enqueued_at, vec![0, 7, 14]);
    assert_eq!(controller.dispatcher().pending(), 3);
}

#[tokio::test(start_paused = true)]
async fn changed_label_is_honoured_immediately() {
    let (_link, mut controller) = setup(MotionConfig::default());

    let labels = ["up", "down", "up", "up", "ccw", "cw"];
    let mut enqueued = Vec::new();
    for label in labels {
        if let Some(cmd) = controller.tick(marker(label)).await.enqueued {
            enqueued.push(cmd.to_string());
        }
        tokio::time::advance(Duration::from_millis(100)).await;
    }

    assert_eq!(enqueued, vec!["up 50", "down 50", "up 50", "ccw 50", "cw 50"]);
}

#[tokio::test(start_paused = true)]
async fn repeated_land_enqueues_once() {
    let (_link, mut controller) = setup(MotionConfig::default());

    let first = controller.tick(marker("land")).await;
    let second = controller.tick(marker("land")).await;

    assert_eq!(first.enqueued, Some(Command::land()));
    assert_eq!(second.enqueued, None);
    assert_eq!(controller.dispatcher().pending(), 1);
}

#[tokio::test(start_paused = true)]
async fn small_target_approaches_without_correction() {
    let (link, mut controller) = setup(MotionConfig::default());

    // area 5000, well off to the left and above centre
    let report = controller
        .tick(DetectionResult::single(Rect::new(10, 10, 110, 60), "follow"))
        .await;
    let servo = report.servo.expect("servo output");
    assert_eq!(servo.band, Band::TooFar);
    assert_eq!((servo.speed_fb, servo.speed_ud, servo.speed_yaw), (15, 0, 0));
    assert_eq!(link.sent(), vec!["rc 0 15 0 0"]);
}

#[tokio::test(start_paused = true)]
async fn queued_moves_reach_the_link_in_order() {
    let link = Arc::new(RecordingLink::with_latency(Duration::from_millis(40)));
    let mut controller = MotionController::new(Arc::clone(&link), MotionConfig::default());
    controller.start();

    for label in ["takeoff", "up", "left", "cw", "land"] {
        controller.tick(marker(label)).await;
    }
    tokio::time::sleep(Duration::from_secs(2)).await;
    controller.shutdown().await;

    assert_eq!(link.sent(), vec!["takeoff", "up 50", "left 50", "cw 50", "land"]);
    assert_eq!(link.max_in_flight(), 1);
    assert!(link.is_closed());
}

#[tokio::test(start_paused = true)]
async fn servo_commands_jump_the_queue() {
    let link = Arc::new(RecordingLink::with_latency(Duration::from_millis(10)));
    let mut config = MotionConfig::default();
    config.dispatch_interval = Duration::from_millis(500);
    let mut controller = MotionController::new(Arc::clone(&link), config);

    controller.tick(marker("up")).await;
    controller.tick(marker("down")).await;
    controller.start();
    controller.tick(marker("follow")).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    controller.shutdown().await;

    assert_eq!(link.sent(), vec!["rc 0 0 -12 6", "up 50", "down 50"]);
}

#[tokio::test(start_paused = true)]
async fn reappearing_marker_cancels_search_before_commanding() {
    let (link, mut controller) = setup(MotionConfig::default());

    controller.tick(DetectionResult::none()).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(controller.is_searching());

    let report = controller.tick(marker("back")).await;
    assert!(!controller.is_searching());
    assert_eq!(report.enqueued, Some(Command::step(Verb::Back, 50)));

    // the dwell would have triggered the second rotation here
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(link.sent(), vec!["cw 20"]);
}

#[tokio::test(start_paused = true)]
async fn search_restarts_after_target_lost_again() {
    let (link, mut controller) = setup(MotionConfig::default());

    controller.tick(DetectionResult::none()).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    controller.tick(marker("follow")).await;
    controller.tick(DetectionResult::none()).await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert!(controller.is_searching());
    assert_eq!(
        link.sent(),
        vec!["cw 20", "rc 0 0 -12 6", "rc 0 0 0 0", "cw 20"]
    );
    controller.shutdown().await;
}
