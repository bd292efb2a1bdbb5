//! Outcomes reported back to the operator by the import runs and maintenance commands.

use std::fmt;

/// Per-run counts, logged when a run finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub withdrawn_deleted: u64,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} updated={} skipped={} failed={} withdrawn_deleted={}",
            self.created, self.updated, self.skipped, self.failed, self.withdrawn_deleted
        )
    }
}

/// What happened to one source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Created,
    Updated,
    Skipped,
}

impl ImportSummary {
    pub fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Created => self.created += 1,
            RecordOutcome::Updated => self.updated += 1,
            RecordOutcome::Skipped => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveSummary {
    pub owned_preprints: u64,
    pub author_links: u64,
}

/// Preprint links of a merged author. A link to a preprint the kept author was already on
/// is dropped instead of moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergedLinks {
    pub moved: u64,
    pub dropped_duplicates: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No author used the active email, so the proxy author was renamed.
    Renamed { author_id: i32 },
    /// The proxy author was folded into the active one.
    Merged {
        kept_author_id: i32,
        links: MergedLinks,
    },
    /// Nothing was written because the operator did not confirm.
    Planned { description: String },
}
