/// Crawl state definitions for tracking per-location progress
///
/// This module defines the states a location passes through during a run and
/// the terminal outcome reported for it.
use std::fmt;

/// Represents where a location's crawl currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlState {
    // ===== Active States =====
    /// Search request for the location name is in flight
    ResolvingLocation,

    /// Page 1 is being rendered to learn the scope's size
    FetchingFirstPage,

    /// Listing page `page` is being fetched through the plain client
    Paginating { page: u32 },

    /// Detail pages for `items` listings on `page` are being fetched
    Enriching { page: u32, items: usize },

    /// Batch for `page` is being handed to the record store
    Checkpointing { page: u32 },

    // ===== Terminal States =====
    /// Every budgeted page is complete
    Done,

    /// The location was abandoned; other locations continue
    Failed { reason: String },
}

impl CrawlState {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }

    /// Short machine-readable name used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResolvingLocation => "resolving_location",
            Self::FetchingFirstPage => "fetching_first_page",
            Self::Paginating { .. } => "paginating",
            Self::Enriching { .. } => "enriching",
            Self::Checkpointing { .. } => "checkpointing",
            Self::Done => "done",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paginating { page } => write!(f, "paginating(page {})", page),
            Self::Enriching { page, items } => {
                write!(f, "enriching(page {}, {} items)", page, items)
            }
            Self::Checkpointing { page } => write!(f, "checkpointing(page {})", page),
            Self::Failed { reason } => write!(f, "failed: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Page and record counters for a location that finished
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageTally {
    /// Pages fetched, enriched and committed during this run
    pub pages_written: u32,

    /// Pages skipped because an earlier run already completed them
    pub pages_skipped: u32,

    /// Records committed during this run
    pub records: usize,
}

/// Terminal result for one requested location
#[derive(Debug, Clone, PartialEq)]
pub struct LocationOutcome {
    pub name: String,
    pub state: CrawlState,
    pub tally: PageTally,
}

impl LocationOutcome {
    pub fn done(name: impl Into<String>, tally: PageTally) -> Self {
        Self {
            name: name.into(),
            state: CrawlState::Done,
            tally,
        }
    }

    pub fn failed(name: impl Into<String>, reason: impl Into<String>, tally: PageTally) -> Self {
        Self {
            name: name.into(),
            state: CrawlState::Failed {
                reason: reason.into(),
            },
            tally,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == CrawlState::Done
    }
}

/// Outcome of a whole run, one entry per requested location in request order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub outcomes: Vec<LocationOutcome>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_done()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn records(&self) -> usize {
        self.outcomes.iter().map(|o| o.tally.records).sum()
    }

    pub fn outcome(&self, name: &str) -> Option<&LocationOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}
