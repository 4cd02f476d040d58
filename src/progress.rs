//! Progress and telemetry events emitted during index builds and
//! retrieval.
//!
//! Hosts embedding the engine implement [`ProgressReporter`]; the two
//! built-in reporters cover interactive terminals (human-readable on
//! stderr) and machine consumers (one JSON object per line).

use serde::Serialize;

/// Build phases, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RetrievalPhase {
    Start,
    Chunking,
    BuildingIndex,
    Saving,
    Done,
}

impl RetrievalPhase {
    pub fn label(&self) -> &'static str {
        match self {
            RetrievalPhase::Start => "start",
            RetrievalPhase::Chunking => "chunking",
            RetrievalPhase::BuildingIndex => "buildingIndex",
            RetrievalPhase::Saving => "saving",
            RetrievalPhase::Done => "done",
        }
    }

    /// Nominal completion percentage when this phase begins.
    pub fn percent(&self) -> u8 {
        match self {
            RetrievalPhase::Start => 0,
            RetrievalPhase::Chunking => 25,
            RetrievalPhase::BuildingIndex => 50,
            RetrievalPhase::Saving => 85,
            RetrievalPhase::Done => 100,
        }
    }
}

/// Stage timings for one answer, emitted when debug is on.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalTelemetry {
    pub cls_ms: u128,
    pub syn_ms: u128,
    pub lex_ms: u128,
    pub rr_ms: u128,
    pub total_ms: u128,
    pub expanded: Vec<String>,
    pub candidate_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RetrievalEvent {
    #[serde(rename = "retrieval-progress")]
    Progress {
        key: String,
        phase: RetrievalPhase,
        percent: u8,
    },
    #[serde(rename = "retrieval-telemetry")]
    Telemetry(RetrievalTelemetry),
}

pub trait ProgressReporter: Send + Sync {
    fn emit(&self, event: &RetrievalEvent);
}

/// Human-readable progress on stderr.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn emit(&self, event: &RetrievalEvent) {
        match event {
            RetrievalEvent::Progress { key, phase, percent } => {
                eprintln!("[{}] {} {}%", key, phase.label(), percent);
            }
            RetrievalEvent::Telemetry(t) => {
                eprintln!(
                    "retrieval took {}ms (classify {}ms, expand {}ms, lexical {}ms, rerank {}ms, {} candidates)",
                    t.total_ms, t.cls_ms, t.syn_ms, t.lex_ms, t.rr_ms, t.candidate_count
                );
            }
        }
    }
}

/// One JSON object per event on stderr, for host processes that parse
/// the stream. Stderr keeps the events out of program output.
pub struct JsonProgress;

impl JsonProgress {
    fn render(event: &RetrievalEvent) -> Option<String> {
        serde_json::to_string(event).ok()
    }
}

impl ProgressReporter for JsonProgress {
    fn emit(&self, event: &RetrievalEvent) {
        if let Some(line) = Self::render(event) {
            eprintln!("{}", line);
        }
    }
}

pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn emit(&self, _event: &RetrievalEvent) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Auto,
    Stderr,
    Json,
    None,
}

/// Pick a reporter. `Auto` uses stderr when attached to a terminal and
/// stays quiet otherwise.
pub fn reporter_for(mode: ProgressMode) -> Box<dyn ProgressReporter> {
    match mode {
        ProgressMode::Stderr => Box::new(StderrProgress),
        ProgressMode::Json => Box::new(JsonProgress),
        ProgressMode::None => Box::new(NoProgress),
        ProgressMode::Auto => {
            if atty::is(atty::Stream::Stderr) {
                Box::new(StderrProgress)
            } else {
                Box::new(NoProgress)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every event for assertions.
    #[derive(Default)]
    pub struct RecordingProgress {
        pub events: Mutex<Vec<RetrievalEvent>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn emit(&self, event: &RetrievalEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    impl RecordingProgress {
        pub fn phases(&self) -> Vec<RetrievalPhase> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    RetrievalEvent::Progress { phase, .. } => Some(*phase),
                    _ => None,
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_progress_monotonically() {
        let order = [
            RetrievalPhase::Start,
            RetrievalPhase::Chunking,
            RetrievalPhase::BuildingIndex,
            RetrievalPhase::Saving,
            RetrievalPhase::Done,
        ];
        for pair in order.windows(2) {
            assert!(pair[0].percent() < pair[1].percent());
        }
        assert_eq!(RetrievalPhase::Done.percent(), 100);
    }

    #[test]
    fn progress_event_serializes_with_tag() {
        let event = RetrievalEvent::Progress {
            key: "page:x".into(),
            phase: RetrievalPhase::Chunking,
            percent: 25,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"retrieval-progress\""));
        assert!(json.contains("\"chunking\""));
    }

    #[test]
    fn json_reporter_renders_one_line_per_event() {
        let event = RetrievalEvent::Progress {
            key: "page:x".into(),
            phase: RetrievalPhase::Done,
            percent: 100,
        };
        let line = JsonProgress::render(&event).unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("\"event\":\"retrieval-progress\""));
    }

    #[test]
    fn telemetry_event_serializes_with_tag() {
        let event = RetrievalEvent::Telemetry(RetrievalTelemetry {
            total_ms: 12,
            candidate_count: 3,
            ..Default::default()
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"retrieval-telemetry\""));
        assert!(json.contains("\"candidateCount\":3"));
    }
}
