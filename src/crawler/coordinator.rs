//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives one run end to end:
//! - Resolving every requested location concurrently
//! - Rendering page 1 of each location and sizing its scope
//! - Paginating through the remaining pages with the plain client
//! - Enriching every listing from its detail page
//! - Checkpointing each page batch into the record store
//!
//! Completed pages are detected before any network call and skipped, so a
//! resumed run picks up exactly where the last one stopped.

use crate::config::Config;
use crate::crawler::client::RateLimitedClient;
use crate::crawler::renderer::Renderer;
use crate::crawler::retry::Retry;
use crate::extract::{
    enrich_listing, parse_listing_page, parse_location_response, parse_page_meta,
    search_request, ExtractionError, PageMeta,
};
use crate::model::{ListingDetail, ListingSummary, Location};
use crate::state::{CrawlState, LocationOutcome, PageTally, RunSummary};
use crate::storage::{Mirror, RecordStore, ScopeManifest};
use crate::url::{absolute, offset_step, page_budget, page_url, slugify, total_pages};
use crate::{Result, ScrapeError};
use futures::future::join_all;
use std::collections::HashMap;
use std::time::Duration;

/// Drives location crawls against one site
///
/// Generic over the page renderer and the mirror backend so both can be
/// replaced in tests.
pub struct Orchestrator<R: Renderer, M: Mirror> {
    config: Config,
    client: RateLimitedClient,
    renderer: R,
    store: RecordStore<M>,
    retry: Retry,
    /// Pages committed during this run, across all locations
    pages_completed: u32,
}

impl<R: Renderer, M: Mirror> Orchestrator<R, M> {
    /// Creates an orchestrator
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `renderer` - Browser session used for page 1 of each location
    /// * `store` - Destination for committed page batches
    pub fn new(config: Config, renderer: R, store: RecordStore<M>) -> Result<Self> {
        let client = RateLimitedClient::new(&config.crawler, &config.site)?;
        let retry = Retry::from_config(&config.crawler);

        Ok(Self {
            config,
            client,
            renderer,
            store,
            retry,
            pages_completed: 0,
        })
    }

    pub fn store(&self) -> &RecordStore<M> {
        &self.store
    }

    /// Resolves each name to a location, concurrently
    ///
    /// Results are returned in the order of `names`; one failure does not
    /// affect the others.
    pub async fn resolve_locations(&self, names: &[String]) -> Vec<Result<Location>> {
        join_all(names.iter().map(|name| self.resolve_location(name))).await
    }

    /// Looks each name up in the mirror, resolving only the ones it lacks
    ///
    /// Names match mirrored locations case-insensitively and are deduplicated
    /// the same way. Newly resolved locations are mirrored before returning.
    pub async fn lookup_locations(
        &mut self,
        names: &[String],
    ) -> Result<Vec<(String, Result<Location>)>> {
        let known = self.store.locations()?;
        let find = |name: &str| {
            known
                .iter()
                .find(|location| location.name.eq_ignore_ascii_case(name.trim()))
                .cloned()
        };

        let mut unique: Vec<&String> = Vec::new();
        for name in names {
            if !unique.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
                unique.push(name);
            }
        }

        let missing: Vec<String> = unique
            .iter()
            .filter(|name| find(name.as_str()).is_none())
            .map(|name| name.to_string())
            .collect();
        tracing::info!(
            known = unique.len() - missing.len(),
            missing = missing.len(),
            "Looking up locations"
        );
        let resolved = self.resolve_locations(&missing).await;
        let mut fresh: HashMap<String, Result<Location>> =
            missing.into_iter().zip(resolved).collect();

        let mut found = Vec::with_capacity(unique.len());
        for name in unique {
            let outcome = match find(name.as_str()) {
                Some(location) => Ok(location),
                None => {
                    let Some(result) = fresh.remove(name.as_str()) else {
                        continue;
                    };
                    if let Ok(location) = &result {
                        if let Err(e) = self.store.record_location(location) {
                            tracing::warn!(location = %location.name, error = %e, "Could not mirror location");
                        }
                    }
                    result
                }
            };
            found.push((name.clone(), outcome));
        }

        Ok(found)
    }

    async fn resolve_location(&self, name: &str) -> Result<Location> {
        transition(name, &CrawlState::ResolvingLocation);

        let target = format!("resolve location '{}'", name);
        let body = search_request(&self.config.site.search_query_id, name);
        let client = &self.client;
        let path = self.config.site.search_path.as_str();
        let body = &body;

        let location = self
            .retry
            .run(&target, move || async move {
                let response = client.post_json(path, body).await?;
                Ok(parse_location_response(&response)?)
            })
            .await?;

        tracing::info!(query = name, resolved = %location.name, "Resolved location");
        Ok(location)
    }

    /// Crawls every requested location
    ///
    /// # Arguments
    ///
    /// * `names` - Location names, in the order they should be crawled
    /// * `max_pages` - Page budget per location; zero or negative means all pages
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - One outcome per name, failed locations included
    /// * `Err(ScrapeError)` - Only for fatal errors such as a browser that will not launch
    pub async fn run(&mut self, names: &[String], max_pages: i64) -> Result<RunSummary> {
        let resolved = self.resolve_locations(names).await;
        let mut summary = RunSummary::default();

        for (name, resolution) in names.iter().zip(resolved) {
            let location = match resolution {
                Ok(location) => location,
                Err(e) => {
                    fail(name, &e);
                    summary
                        .outcomes
                        .push(LocationOutcome::failed(name, e.to_string(), PageTally::default()));
                    continue;
                }
            };

            if let Err(e) = self.store.record_location(&location) {
                tracing::warn!(location = %location.name, error = %e, "Could not mirror location");
            }

            let mut tally = PageTally::default();
            let result = self.crawl_location(&location, max_pages, &mut tally).await;

            if let Err(e) = self.renderer.close().await {
                tracing::warn!(location = %location.name, error = %e, "Could not close browser session");
            }

            match result {
                Ok(()) => {
                    transition(name, &CrawlState::Done);
                    tracing::info!(
                        location = %location.name,
                        pages_written = tally.pages_written,
                        pages_skipped = tally.pages_skipped,
                        records = tally.records,
                        "Location complete"
                    );
                    summary.outcomes.push(LocationOutcome::done(name, tally));
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(location = %location.name, error = %e, "Aborting run");
                    return Err(e);
                }
                Err(e) => {
                    fail(name, &e);
                    summary
                        .outcomes
                        .push(LocationOutcome::failed(name, e.to_string(), tally));
                }
            }
        }

        tracing::info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            records = summary.records(),
            "Run finished"
        );
        Ok(summary)
    }

    async fn crawl_location(
        &mut self,
        location: &Location,
        max_pages: i64,
        tally: &mut PageTally,
    ) -> Result<()> {
        let slug = slugify(&location.name);
        let scope = self.scope_for(location, &slug, tally).await?;

        let mut budget = page_budget(max_pages, scope.total_pages);
        tracing::info!(
            location = %location.name,
            total_results = scope.total_results,
            total_pages = scope.total_pages,
            budget,
            "Sized listing scope"
        );

        let template = match (&scope.next_page, budget > 1) {
            (Some(template), _) => template.clone(),
            (None, true) => {
                tracing::warn!(location = %location.name, "Page 1 has no next-page link; stopping after it");
                budget = 1;
                String::new()
            }
            (None, false) => String::new(),
        };

        for page in 2..=budget {
            if self.store.is_complete(&slug, page) {
                tracing::debug!(location = %location.name, page, "Page already committed, skipping");
                tally.pages_skipped += 1;
                continue;
            }

            transition(&location.name, &CrawlState::Paginating { page });
            let href = page_url(
                &template,
                &self.config.site.offset_token,
                page,
                scope.results_on_first_page,
            )
            .ok_or_else(|| ExtractionError::shape("nextPage", template.as_str()))?;
            let url = absolute(&self.config.site.base_url, &href)?;

            let rows = self.fetch_listing_page(&url).await?;
            self.process_batch(location, &slug, page, &rows, tally)
                .await?;

            let delay = Duration::from_millis(self.config.crawler.page_delay_ms);
            if !delay.is_zero() && page < budget {
                tokio::time::sleep(delay).await;
            }
        }

        Ok(())
    }

    /// Sizes the location's scope, rendering page 1 only when necessary
    ///
    /// A committed page 1 plus a saved manifest means nothing is fetched.
    async fn scope_for(
        &mut self,
        location: &Location,
        slug: &str,
        tally: &mut PageTally,
    ) -> Result<ScopeManifest> {
        let first_done = self.store.is_complete(slug, 1);

        if first_done {
            if let Some(scope) = self.store.scope(slug)? {
                tracing::info!(location = %location.name, "Resuming from saved scope");
                tally.pages_skipped += 1;
                return Ok(scope);
            }
        }

        transition(&location.name, &CrawlState::FetchingFirstPage);
        self.renderer.start().await?;

        let url = absolute(&self.config.site.base_url, &location.listing_url.food)?;
        let (rows, meta) = self.fetch_first_page(&url).await?;

        // The next link's offset is the page size; the scraped row count
        // misses sponsored entries
        let results_on_first_page = meta
            .next_page
            .as_deref()
            .and_then(|link| offset_step(link, &self.config.site.offset_token))
            .unwrap_or_else(|| u32::try_from(rows.len()).unwrap_or(u32::MAX));
        let scope = ScopeManifest {
            total_results: meta.total_results,
            results_on_first_page,
            total_pages: total_pages(meta.total_results, results_on_first_page),
            next_page: meta.next_page,
        };
        self.store.save_scope(slug, &scope)?;

        if first_done {
            tally.pages_skipped += 1;
        } else {
            self.process_batch(location, slug, 1, &rows, tally).await?;
        }

        Ok(scope)
    }

    async fn fetch_first_page(&self, url: &str) -> Result<(Vec<ListingSummary>, PageMeta)> {
        let target = format!("render listing page {}", url);
        let renderer = &self.renderer;
        let site = &self.config.site;
        let wait_for = self.config.browser.wait_for.as_slice();

        self.retry
            .run(&target, move || async move {
                let html = renderer.render(url, wait_for).await?;
                let rows = parse_listing_page(&html, site)?;
                let meta = parse_page_meta(&html, site)?;
                Ok((rows, meta))
            })
            .await
    }

    async fn fetch_listing_page(&self, url: &str) -> Result<Vec<ListingSummary>> {
        let target = format!("listing page {}", url);
        let client = &self.client;
        let site = &self.config.site;

        self.retry
            .run(&target, move || async move {
                let html = client.get_text(url).await?;
                Ok(parse_listing_page(&html, site)?)
            })
            .await
    }

    /// Enriches and commits one page; only a persistence failure is an error
    async fn process_batch(
        &mut self,
        location: &Location,
        slug: &str,
        page: u32,
        rows: &[ListingSummary],
        tally: &mut PageTally,
    ) -> Result<()> {
        transition(
            &location.name,
            &CrawlState::Enriching {
                page,
                items: rows.len(),
            },
        );
        let details = self.enrich_batch(page, rows).await;

        transition(&location.name, &CrawlState::Checkpointing { page });
        let written = self
            .store
            .commit_batch(slug, &location.name, page, &details)?;

        tally.pages_written += 1;
        tally.records += written;
        self.pages_completed += 1;
        tracing::info!(
            location = %location.name,
            page,
            records = written,
            dropped = rows.len() - details.len(),
            "Committed page"
        );

        if self.pages_completed % self.config.crawler.reset_every.max(1) == 0 {
            self.client.reset();
        }

        Ok(())
    }

    /// Fetches every detail page of a batch concurrently
    ///
    /// Items whose identity cannot be extracted are dropped with a warning.
    async fn enrich_batch(&self, page: u32, rows: &[ListingSummary]) -> Vec<ListingDetail> {
        let results = join_all(rows.iter().map(|row| self.enrich_one(row))).await;

        results
            .into_iter()
            .zip(rows)
            .filter_map(|(result, row)| match result {
                Ok(detail) => Some(detail),
                Err(e) => {
                    tracing::warn!(page, url = %row.detail_url, error = %e, "Dropping listing");
                    None
                }
            })
            .collect()
    }

    async fn enrich_one(&self, row: &ListingSummary) -> Result<ListingDetail> {
        let base = self.config.site.base_url.as_str();
        let summary = ListingSummary {
            detail_url: absolute(base, &row.detail_url)?,
            images: row
                .images
                .iter()
                .filter_map(|src| absolute(base, src).ok())
                .collect(),
        };

        let target = format!("detail page {}", summary.detail_url);
        let client = &self.client;
        let marker = self.config.site.state_marker.as_str();
        let summary = &summary;

        let enrichment = self
            .retry
            .run(&target, move || async move {
                let html = client.get_text(&summary.detail_url).await?;
                Ok(enrich_listing(summary, &html, marker)?)
            })
            .await?;

        for failure in &enrichment.degraded {
            tracing::warn!(
                url = %summary.detail_url,
                group = failure.group,
                error = %failure.error,
                "Field group left at default"
            );
        }

        Ok(enrichment.detail)
    }
}

fn transition(location: &str, state: &CrawlState) {
    tracing::debug!(location, state = %state, "State transition");
}

fn fail(location: &str, err: &ScrapeError) {
    let state = CrawlState::Failed {
        reason: err.to_string(),
    };
    tracing::error!(location, attempts = ?err.attempts(), state = %state, "Location failed");
}
