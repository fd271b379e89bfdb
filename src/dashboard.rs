//! Loop log summaries for trend display

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::LoopError;
use crate::logger::{timestamp_format, LogRecord, PatternLog};
use crate::types::{ContextTag, LoopType};

/// Number of logged sessions of one loop type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoopCount {
    pub loop_type: LoopType,
    pub count: usize,
}

/// A recently logged session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentPattern {
    #[serde(with = "timestamp_format")]
    pub timestamp: chrono::NaiveDateTime,
    pub pattern: String,
    pub context: ContextTag,
    pub loop_type: LoopType,
}

/// Read-only view over the loop log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogSummary {
    pub total_sessions: usize,
    /// Non-zero counts, in `LoopType` order
    pub loop_counts: Vec<LoopCount>,
    pub breaks_suggested: usize,
    pub breaks_not_suggested: usize,
    /// Last rows of the log, oldest first
    pub recent: Vec<RecentPattern>,
}

impl LogSummary {
    pub fn from_records(records: &[LogRecord], recent: usize) -> Self {
        let mut counts: BTreeMap<LoopType, usize> = BTreeMap::new();
        for record in records {
            *counts.entry(record.loop_type).or_default() += 1;
        }

        let breaks_suggested = records.iter().filter(|r| r.break_suggested).count();

        let recent = records[records.len().saturating_sub(recent)..]
            .iter()
            .map(|r| RecentPattern {
                timestamp: r.timestamp,
                pattern: r.pattern.clone(),
                context: r.context,
                loop_type: r.loop_type,
            })
            .collect();

        Self {
            total_sessions: records.len(),
            loop_counts: counts
                .into_iter()
                .map(|(loop_type, count)| LoopCount { loop_type, count })
                .collect(),
            breaks_suggested,
            breaks_not_suggested: records.len() - breaks_suggested,
            recent,
        }
    }

    /// Summarize the log on disk
    pub fn load(log: &PatternLog, recent: usize) -> Result<Self, LoopError> {
        Ok(Self::from_records(&log.load()?, recent))
    }

    /// Most frequent loop type; ties go to the earlier `LoopType`
    pub fn dominant_loop(&self) -> Option<LoopType> {
        self.loop_counts
            .iter()
            .fold(None::<LoopCount>, |best, c| match best {
                Some(b) if b.count >= c.count => Some(b),
                _ => Some(*c),
            })
            .map(|c| c.loop_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn record(minute: u32, loop_type: LoopType, context: ContextTag) -> LogRecord {
        LogRecord {
            timestamp: NaiveDate::from_ymd_opt(2025, 7, 3)
                .unwrap()
                .and_hms_opt(12, minute, 0)
                .unwrap(),
            session_id: Uuid::new_v4(),
            pattern: format!("P{minute}"),
            loop_type,
            duration_sec: 10.0,
            context,
            break_suggested: loop_type.suggests_break(),
        }
    }

    fn sample_records() -> Vec<LogRecord> {
        vec![
            record(0, LoopType::Normal, ContextTag::Reading),
            record(1, LoopType::EscapeLoop, ContextTag::EscapeIdle),
            record(2, LoopType::ConsumptionLoop, ContextTag::Browsing),
            record(3, LoopType::EscapeLoop, ContextTag::EscapeIdle),
            record(4, LoopType::FreezeLoop, ContextTag::Unknown),
        ]
    }

    #[test]
    fn test_counts_by_loop_type() {
        let summary = LogSummary::from_records(&sample_records(), 10);

        assert_eq!(summary.total_sessions, 5);
        assert_eq!(
            summary.loop_counts,
            vec![
                LoopCount { loop_type: LoopType::Normal, count: 1 },
                LoopCount { loop_type: LoopType::EscapeLoop, count: 2 },
                LoopCount { loop_type: LoopType::FreezeLoop, count: 1 },
                LoopCount { loop_type: LoopType::ConsumptionLoop, count: 1 },
            ]
        );
        assert_eq!(summary.dominant_loop(), Some(LoopType::EscapeLoop));
    }

    #[test]
    fn test_break_counts() {
        let summary = LogSummary::from_records(&sample_records(), 10);
        assert_eq!(summary.breaks_suggested, 3);
        assert_eq!(summary.breaks_not_suggested, 2);
    }

    #[test]
    fn test_recent_is_tail_oldest_first() {
        let summary = LogSummary::from_records(&sample_records(), 2);
        let patterns: Vec<&str> = summary.recent.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["P3", "P4"]);
    }

    #[test]
    fn test_empty_log() {
        let summary = LogSummary::from_records(&[], 5);
        assert_eq!(summary.total_sessions, 0);
        assert!(summary.loop_counts.is_empty());
        assert!(summary.recent.is_empty());
        assert_eq!(summary.dominant_loop(), None);
    }
}
