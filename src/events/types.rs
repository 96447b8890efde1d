//! What the engine reports while a scan runs.

use serde::{Deserialize, Serialize};

/// All events emitted while a scan runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Run-level events
    Scan(ScanEvent),
    /// Photo bytes fetched
    Download(DownloadEvent),
    /// Hashing stage events
    Hash(HashEvent),
    /// Pairwise comparison events
    Compare(CompareEvent),
}

/// Run-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// A scan has started
    Started { run_id: String, total_photos: usize },
    /// Moving to a new phase
    PhaseChanged { phase: ScanPhase },
    /// Narrowing found nothing, so all photos form one candidate set
    FallbackApplied { candidate_items: usize },
    /// The scan finished and produced a result
    Completed { summary: ScanSummary },
    /// The scan was aborted
    Error { message: String },
}

/// Phases of a scan, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanPhase {
    Narrowing,
    ByteHashing,
    ExactGrouping,
    PerceptualHashing,
    Comparing,
    Finalizing,
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanPhase::Narrowing => write!(f, "Narrowing"),
            ScanPhase::ByteHashing => write!(f, "Hashing bytes"),
            ScanPhase::ExactGrouping => write!(f, "Grouping exact duplicates"),
            ScanPhase::PerceptualHashing => write!(f, "Perceptual hashing"),
            ScanPhase::Comparing => write!(f, "Comparing"),
            ScanPhase::Finalizing => write!(f, "Finalizing"),
        }
    }
}

/// Where a photo's bytes came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteSource {
    Network,
    Fixture,
}

/// Download events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DownloadEvent {
    /// Bytes for a photo were fetched (cache hits are not reported)
    Fetched {
        photo_id: String,
        source: ByteSource,
        size_bytes: usize,
    },
}

/// Which hashing stage an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashStage {
    /// Content digests
    Bytes,
    /// dHash + pHash pairs
    Perceptual,
}

/// Byte or perceptual hashing over the worker pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HashEvent {
    Started { stage: HashStage, total_photos: usize },
    /// One photo finished; arrives in completion order, not input order
    Progress(HashProgress),
    Completed { stage: HashStage, total_hashed: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashProgress {
    pub stage: HashStage,
    /// Photos done in this stage, including this one
    pub completed: usize,
    pub total: usize,
    pub photo_id: String,
}

/// Pairwise comparison inside candidate sets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CompareEvent {
    Started {
        candidate_sets: usize,
        total_comparisons: usize,
    },
    /// Throttled, so not every comparison is reported
    Progress(CompareProgress),
    Completed {
        very_similar_groups: usize,
        possibly_similar_groups: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareProgress {
    pub comparisons_completed: usize,
    pub total_comparisons: usize,
}

/// Summary of a finished scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub run_id: String,
    pub total_photos: usize,
    pub exact_groups: usize,
    pub very_similar_groups: usize,
    pub possibly_similar_groups: usize,
    pub downloads_performed: usize,
    pub total_cost: f64,
    /// Wall clock for the whole run
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_progress_survives_json() {
        let event = Event::Hash(HashEvent::Progress(HashProgress {
            stage: HashStage::Perceptual,
            completed: 10,
            total: 50,
            photo_id: "p10".to_string(),
        }));

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Hash(HashEvent::Progress(p)) => {
                assert_eq!(p.completed, 10);
                assert_eq!(p.stage, HashStage::Perceptual);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn scan_summary_is_serializable() {
        let summary = ScanSummary {
            run_id: "abc".to_string(),
            total_photos: 1000,
            exact_groups: 5,
            very_similar_groups: 7,
            possibly_similar_groups: 3,
            downloads_performed: 990,
            total_cost: 0.25,
            duration_ms: 5000,
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"downloads_performed\":990"));
    }

    #[test]
    fn phases_display() {
        assert_eq!(ScanPhase::Comparing.to_string(), "Comparing");
        assert_eq!(ScanPhase::ByteHashing.to_string(), "Hashing bytes");
    }
}
