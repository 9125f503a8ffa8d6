//! Human-readable reports for the command line

use crate::model::Location;
use crate::state::{CrawlState, RunSummary};
use std::fmt::Write;

/// Renders the per-location outcome of a run
pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Run Summary ===\n");

    for outcome in &summary.outcomes {
        match &outcome.state {
            CrawlState::Done => {
                let _ = writeln!(
                    out,
                    "  [done]   {}: {} page(s) written, {} skipped, {} record(s)",
                    outcome.name,
                    outcome.tally.pages_written,
                    outcome.tally.pages_skipped,
                    outcome.tally.records
                );
            }
            CrawlState::Failed { reason } => {
                let _ = writeln!(out, "  [failed] {}: {}", outcome.name, reason);
            }
            other => {
                let _ = writeln!(out, "  [{}] {}", other, outcome.name);
            }
        }
    }

    let _ = writeln!(
        out,
        "\n{} succeeded, {} failed, {} record(s) written",
        summary.succeeded(),
        summary.failed(),
        summary.records()
    );
    out
}

pub fn print_run_summary(summary: &RunSummary) {
    print!("{}", format_run_summary(summary));
}

/// Renders resolved locations, one per line
pub fn format_locations(locations: &[Location]) -> String {
    let mut out = String::new();
    for location in locations {
        let _ = writeln!(
            out,
            "{}\t{}\t({:.4}, {:.4})\t{}",
            location.name,
            location.place_type,
            location.latitude,
            location.longitude,
            location.listing_url.food
        );
    }
    out
}

pub fn print_locations(locations: &[Location]) {
    print!("{}", format_locations(locations));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CategoryUrls;
    use crate::state::{LocationOutcome, PageTally};

    #[test]
    fn test_format_run_summary() {
        let summary = RunSummary {
            outcomes: vec![
                LocationOutcome::done(
                    "Boston",
                    PageTally {
                        pages_written: 2,
                        pages_skipped: 1,
                        records: 58,
                    },
                ),
                LocationOutcome::failed("Atlantis", "no details", PageTally::default()),
            ],
        };

        let text = format_run_summary(&summary);
        assert!(text.contains("[done]   Boston: 2 page(s) written, 1 skipped, 58 record(s)"));
        assert!(text.contains("[failed] Atlantis: no details"));
        assert!(text.contains("1 succeeded, 1 failed, 58 record(s) written"));
    }

    #[test]
    fn test_format_locations() {
        let locations = vec![Location {
            name: "Boston".to_string(),
            url: "/Tourism-g60745-Boston.html".to_string(),
            listing_url: CategoryUrls {
                food: "/Restaurants-g60745-Boston.html".to_string(),
                fun: String::new(),
                lodging: String::new(),
            },
            place_type: "CITY".to_string(),
            latitude: 42.36,
            longitude: -71.06,
        }];

        assert_eq!(
            format_locations(&locations),
            "Boston\tCITY\t(42.3600, -71.0600)\t/Restaurants-g60745-Boston.html\n"
        );
    }
}
