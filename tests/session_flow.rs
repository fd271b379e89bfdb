use std::io::Cursor;
use std::ops::ControlFlow;
use std::time::Duration;

use mirrormind::session::SessionOptions;
use mirrormind::{
    LogStatus, LogSummary, LoopProcessor, LoopType, NdjsonFrameSource, PatternLog, Termination,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// Face and eyes on every frame, eyes toggling open/closed so each pair is one blink
fn blinking_session(blinks: usize) -> String {
    let mut lines = Vec::new();
    for i in 0..blinks * 2 {
        lines.push(format!(
            r#"{{"elapsed_sec": {}, "kind": "signal", "face_detected": true, "eyes_detected": true, "eye_closed": {}}}"#,
            i as f64 * 0.5,
            i % 2 == 0
        ));
    }
    lines.join("\n")
}

fn replay(ndjson: &str) -> NdjsonFrameSource<Cursor<Vec<u8>>> {
    NdjsonFrameSource::new(Cursor::new(ndjson.as_bytes().to_vec()))
}

#[test]
fn test_replayed_sessions_are_logged_and_summarized() {
    let dir = TempDir::new().unwrap();
    let log = PatternLog::new(dir.path().join("nested").join("loop_log.csv"));
    let processor = LoopProcessor::new()
        .with_log(log.clone())
        .with_pattern_label("Replay");

    let doubt = processor.run_session(replay(&blinking_session(4)));
    assert_eq!(doubt.loop_type, LoopType::DoubtLoop);
    assert_eq!(doubt.blink_count, 4);
    assert!(!doubt.break_suggested);
    assert_eq!(doubt.termination, Termination::EndOfStream);

    let steady = processor.run_session(replay(&blinking_session(3)));
    assert_eq!(steady.loop_type, LoopType::Normal);
    assert_eq!(steady.blink_count, 3);

    let frozen = processor.run_session(replay(
        r#"{"elapsed_sec": 1.0, "kind": "signal", "face_detected": true, "eyes_detected": false}"#,
    ));
    assert_eq!(frozen.loop_type, LoopType::FreezeLoop);
    assert!(frozen.break_suggested);
    assert_eq!(frozen.log_status, LogStatus::Written { rows: 3 });

    let summary = LogSummary::load(&log, 10).unwrap();
    assert_eq!(summary.total_sessions, 3);
    assert_eq!(summary.breaks_suggested, 1);
    assert_eq!(summary.breaks_not_suggested, 2);

    let order: Vec<LoopType> = summary.recent.iter().map(|r| r.loop_type).collect();
    assert_eq!(
        order,
        vec![LoopType::DoubtLoop, LoopType::Normal, LoopType::FreezeLoop]
    );
    assert!(summary.recent.iter().all(|r| r.pattern == "Replay"));
}

#[test]
fn test_corrupt_replay_keeps_frames_before_the_failure() {
    let ndjson = format!(
        "{}\n{{ this is not a frame",
        r#"{"elapsed_sec": 150.0, "kind": "signal", "face_detected": true, "eyes_detected": true}"#
    );

    let outcome = LoopProcessor::new().run_session(replay(&ndjson));

    assert_eq!(outcome.frames, 1);
    assert_eq!(outcome.loop_type, LoopType::ConsumptionLoop);
    assert!(matches!(outcome.termination, Termination::DeviceFailure(_)));
    assert_eq!(outcome.log_status, LogStatus::Skipped);
}

#[test]
fn test_stop_request_and_max_duration_end_session_early() {
    let ndjson = blinking_session(10);

    let mut seen = 0;
    let stopped = LoopProcessor::new().run_session_with(replay(&ndjson), |status| {
        seen += 1;
        if status.frame_index == 3 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    assert_eq!(seen, 3);
    assert_eq!(stopped.frames, 3);
    assert_eq!(stopped.termination, Termination::StopRequested);

    let capped = LoopProcessor::new()
        .with_options(SessionOptions {
            max_duration: Some(Duration::from_secs(2)),
            ..SessionOptions::default()
        })
        .run_session(replay(&ndjson));
    assert_eq!(capped.termination, Termination::MaxDuration);
    assert_eq!(capped.duration_sec, 2.0);
    assert_eq!(capped.frames, 5);
}
