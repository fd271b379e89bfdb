//! Session pipeline orchestration
//!
//! Public API tying the stages together:
//! frames → signals → aggregator → snapshot → classifier → outcome → loop log.

use std::ops::ControlFlow;

use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::classifier::LoopClassifier;
use crate::config::MirrorConfig;
use crate::error::LoopError;
use crate::logger::{timestamp_format, LogRecord, PatternLog};
use crate::session::{LiveStatus, SessionOptions, SessionReport, SessionRunner, Termination};
use crate::source::{FrameSource, MemoryFrameSource, TimedFrame};
use crate::types::{ContextTag, LoopType};

/// Pattern label recorded when none is configured
pub const DEFAULT_PATTERN_LABEL: &str = "DetectedGazePattern";

/// Whether the outcome made it into the loop log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LogStatus {
    /// No log was configured
    Skipped,
    /// Appended; the log now holds `rows` sessions
    Written { rows: usize },
    /// The log could not be written; the classification is still valid
    Failed { reason: String },
}

/// Everything known about one finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub pattern: String,
    pub loop_type: LoopType,
    pub break_suggested: bool,
    pub context: ContextTag,
    pub duration_sec: f64,
    pub blink_count: u32,
    pub frames: u64,
    pub termination: Termination,
    pub log_status: LogStatus,
}

impl SessionOutcome {
    pub fn to_log_record(&self) -> LogRecord {
        LogRecord {
            timestamp: self.timestamp,
            session_id: self.session_id,
            pattern: self.pattern.clone(),
            loop_type: self.loop_type,
            duration_sec: self.duration_sec,
            context: self.context,
            break_suggested: self.break_suggested,
        }
    }
}

/// Parse newline-delimited `TimedFrame` JSON, failing on the first bad line
pub fn parse_frames(ndjson: &str) -> Result<Vec<TimedFrame>, LoopError> {
    let mut frames = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<TimedFrame>(trimmed) {
            Ok(frame) => frames.push(frame),
            Err(e) => {
                return Err(LoopError::Parse(format!(
                    "Failed to parse line {}: {}",
                    line_num + 1,
                    e
                )));
            }
        }
    }
    Ok(frames)
}

/// Classify a recorded session (stateless, one-shot, nothing logged).
///
/// # Arguments
/// * `frames_ndjson` - One `TimedFrame` JSON object per line
///
/// # Returns
/// `SessionOutcome` JSON string
pub fn frames_to_outcome(frames_ndjson: String) -> Result<String, LoopError> {
    let frames = parse_frames(&frames_ndjson)?;
    let processor = LoopProcessor::new();
    let outcome = processor.run_session(MemoryFrameSource::new(frames));
    Ok(serde_json::to_string(&outcome)?)
}

/// Stateful processor that runs sessions and records them in a loop log.
pub struct LoopProcessor {
    runner: SessionRunner,
    pattern_label: String,
    log: Option<PatternLog>,
}

impl Default for LoopProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopProcessor {
    /// Processor with default thresholds, no duration limit and no log
    pub fn new() -> Self {
        Self {
            runner: SessionRunner::default(),
            pattern_label: DEFAULT_PATTERN_LABEL.to_string(),
            log: None,
        }
    }

    /// Processor configured from a loaded `MirrorConfig`, logging to its `log_path`
    pub fn from_config(config: &MirrorConfig) -> Self {
        Self {
            runner: SessionRunner::new(SessionOptions {
                max_duration: config.max_duration(),
                thresholds: config.thresholds,
            }),
            pattern_label: config.pattern_label.clone(),
            log: Some(PatternLog::new(&config.log_path)),
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.runner = SessionRunner::new(options);
        self
    }

    pub fn with_log(mut self, log: PatternLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn without_log(mut self) -> Self {
        self.log = None;
        self
    }

    pub fn with_pattern_label(mut self, label: impl Into<String>) -> Self {
        self.pattern_label = label.into();
        self
    }

    pub fn log(&self) -> Option<&PatternLog> {
        self.log.as_ref()
    }

    /// Run a full session and conclude it
    pub fn run_session<S: FrameSource>(&self, source: S) -> SessionOutcome {
        self.run_session_with(source, |_| ControlFlow::Continue(()))
    }

    /// Run a full session with live per-frame feedback and conclude it
    pub fn run_session_with<S, F>(&self, source: S, on_frame: F) -> SessionOutcome
    where
        S: FrameSource,
        F: FnMut(&LiveStatus) -> ControlFlow<()>,
    {
        let report = self.runner.run_with(source, on_frame);
        self.conclude(report)
    }

    /// Classify a finished session and append it to the log, if any.
    ///
    /// A log failure is reported in `log_status`; it never discards the result.
    pub fn conclude(&self, report: SessionReport) -> SessionOutcome {
        let classification = LoopClassifier::evaluate(&report.snapshot);

        let mut outcome = SessionOutcome {
            session_id: Uuid::new_v4(),
            timestamp: Local::now().naive_local().trunc_subsecs(0),
            pattern: self.pattern_label.clone(),
            loop_type: classification.loop_type,
            break_suggested: classification.break_suggested,
            context: classification.context,
            duration_sec: report.snapshot.duration_sec,
            blink_count: report.snapshot.blink_count,
            frames: report.snapshot.frame_count,
            termination: report.termination,
            log_status: LogStatus::Skipped,
        };

        if let Some(log) = &self.log {
            outcome.log_status = match log.append(&outcome.to_log_record()) {
                Ok(rows) => LogStatus::Written { rows },
                Err(e) => {
                    warn!(path = %log.path().display(), error = %e, "failed to log session");
                    LogStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            };
        }

        info!(
            session_id = %outcome.session_id,
            loop_type = %outcome.loop_type,
            context = %outcome.context,
            break_suggested = outcome.break_suggested,
            duration_sec = outcome.duration_sec,
            "session classified"
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Signal;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn sample_frames_ndjson() -> &'static str {
        r#"
{"elapsed_sec": 0.0, "kind": "signal", "face_detected": true, "eyes_detected": true, "eye_closed": false, "gaze": {"right": {"x": 300, "y": 200}, "left": {"x": 360, "y": 200}}}
{"elapsed_sec": 2.5, "kind": "signal", "face_detected": true, "eyes_detected": true, "eye_closed": false, "gaze": {"right": {"x": 301, "y": 200}, "left": {"x": 361, "y": 200}}}
{"elapsed_sec": 5.0, "kind": "signal", "face_detected": true, "eyes_detected": true, "eye_closed": false, "gaze": {"right": {"x": 302, "y": 201}, "left": {"x": 362, "y": 201}}}
"#
    }

    #[test]
    fn test_frames_to_outcome_stateless() {
        let json = frames_to_outcome(sample_frames_ndjson().to_string()).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(payload["loop_type"], "Normal");
        assert_eq!(payload["break_suggested"], false);
        assert_eq!(payload["context"], "Reading");
        assert_eq!(payload["duration_sec"], 5.0);
        assert_eq!(payload["frames"], 3);
        assert_eq!(payload["pattern"], DEFAULT_PATTERN_LABEL);
        assert_eq!(payload["termination"]["reason"], "end_of_stream");
        assert_eq!(payload["log_status"]["status"], "skipped");
    }

    #[test]
    fn test_invalid_frames_rejected() {
        let err = frames_to_outcome("{\"elapsed_sec\": 0}\nnot json".to_string()).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_processor_appends_to_log() {
        let dir = TempDir::new().unwrap();
        let log = PatternLog::new(dir.path().join("loop_log.csv"));
        let processor = LoopProcessor::new()
            .with_log(log.clone())
            .with_pattern_label("DeskSession");

        let frames = || {
            MemoryFrameSource::new([TimedFrame::signal(200.0, Signal::default())])
        };

        let first = processor.run_session(frames());
        let second = processor.run_session(frames());

        assert_eq!(first.loop_type, LoopType::EscapeLoop);
        assert!(first.break_suggested);
        assert_eq!(first.log_status, LogStatus::Written { rows: 1 });
        assert_eq!(second.log_status, LogStatus::Written { rows: 2 });

        let rows = log.load().unwrap();
        assert_eq!(rows[0], first.to_log_record());
        assert_eq!(rows[1].pattern, "DeskSession");
        assert_ne!(rows[0].session_id, rows[1].session_id);
    }

    #[test]
    fn test_log_failure_still_returns_classification() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let processor = LoopProcessor::new().with_log(PatternLog::new(blocker.join("log.csv")));
        let outcome = processor.run_session(MemoryFrameSource::new([TimedFrame::signal(
            1.0,
            Signal {
                face_detected: true,
                smile_detected: true,
                ..Signal::default()
            },
        )]));

        assert_eq!(outcome.loop_type, LoopType::ComparisonLoop);
        assert!(matches!(outcome.log_status, LogStatus::Failed { .. }));
    }

    #[test]
    fn test_face_mesh_sessions_feed_dashboard() {
        use crate::dashboard::LogSummary;
        use crate::perception::{landmark_index as idx, FaceMeshFrame, Landmark};

        let dir = TempDir::new().unwrap();
        let log = PatternLog::new(dir.path().join("loop_log.csv"));
        let processor = LoopProcessor::new().with_log(log.clone());

        let mesh = |lip_gap: f64| {
            let mut face = vec![Landmark::new(0.5, 0.5); 478];
            face[idx::UPPER_LIP] = Landmark::new(0.5, 0.70);
            face[idx::LOWER_LIP] = Landmark::new(0.5, 0.70 + lip_gap);
            face[idx::LEFT_EYE_UPPER_LID] = Landmark::new(0.6, 0.40);
            face[idx::LEFT_EYE_LOWER_LID] = Landmark::new(0.6, 0.43);
            face[idx::RIGHT_IRIS] = Landmark::new(0.4, 0.415);
            face[idx::LEFT_IRIS] = Landmark::new(0.6, 0.415);
            FaceMeshFrame {
                width: 640,
                height: 480,
                faces: vec![face],
                hands: Vec::new(),
            }
        };

        let smiling = processor.run_session(MemoryFrameSource::new([
            TimedFrame::face_mesh(0.0, mesh(0.01)),
            TimedFrame::face_mesh(1.0, mesh(0.05)),
        ]));
        let steady = processor.run_session(MemoryFrameSource::new([
            TimedFrame::face_mesh(0.0, mesh(0.01)),
            TimedFrame::face_mesh(3.0, mesh(0.01)),
        ]));
        let away = processor.run_session(MemoryFrameSource::new([TimedFrame::face_mesh(
            2.0,
            FaceMeshFrame::default(),
        )]));

        assert_eq!(smiling.loop_type, LoopType::ComparisonLoop);
        assert_eq!(steady.loop_type, LoopType::Normal);
        assert_eq!(steady.context, ContextTag::Reading);
        assert_eq!(away.loop_type, LoopType::EscapeLoop);
        assert_eq!(away.context, ContextTag::EscapeIdle);
        assert_eq!(away.log_status, LogStatus::Written { rows: 3 });

        let summary = LogSummary::load(&log, 2).unwrap();
        assert_eq!(summary.total_sessions, 3);
        assert_eq!(summary.breaks_suggested, 1);
        assert_eq!(summary.breaks_not_suggested, 2);
        assert_eq!(summary.recent.len(), 2);
        assert_eq!(summary.recent[1].loop_type, LoopType::EscapeLoop);
    }

    #[test]
    fn test_outcome_timestamp_has_whole_seconds() {
        let outcome = LoopProcessor::new().run_session(MemoryFrameSource::default());
        assert_eq!(outcome.timestamp.and_utc().timestamp_subsec_nanos(), 0);
    }
}
