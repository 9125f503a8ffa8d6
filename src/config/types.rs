use serde::Deserialize;

/// Main configuration structure for Dinescout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    pub output: OutputConfig,
}

/// Crawler pacing and resilience configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Maximum listing pages per location (zero or negative means no limit)
    pub max_pages: i64,

    /// Maximum number of concurrent in-flight requests
    pub max_connections: u32,

    /// Total per-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// Attempts made by the retry envelope before giving up
    pub retry_attempts: u32,

    /// Fixed delay between retry attempts (seconds)
    pub retry_delay_secs: u64,

    /// Rotate the client identity after this many completed pages
    pub reset_every: u32,

    /// Pause between consecutive listing pages (milliseconds)
    pub page_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: 3,
            max_connections: 5,
            request_timeout_secs: 10,
            retry_attempts: 5,
            retry_delay_secs: 15,
            reset_every: 3,
            page_delay_ms: 1000,
        }
    }
}

/// Site-specific endpoints and markup rules
///
/// Everything here tracks the upstream site's markup and is expected to drift.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SiteConfig {
    /// Site root; relative listing and detail links are resolved against it
    pub base_url: String,

    /// Path of the location search endpoint
    pub search_path: String,

    /// Persisted query id sent with every location search
    pub search_query_id: String,

    /// One element per search result on a listing page
    pub result_selector: String,

    /// Detail-page link inside a result element
    pub link_selector: String,

    /// Preview images inside a result element
    pub image_selector: String,

    /// Attribute marking a result as sponsored
    pub sponsored_attribute: String,

    /// Element carrying the declared total result count
    pub total_results_selector: String,

    /// Link to the next listing page
    pub next_page_selector: String,

    /// Token that precedes the embedded JSON state in an inline script
    pub state_marker: String,

    /// Path segment prefix that carries the result offset in listing URLs
    pub offset_token: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.tripadvisor.com".to_string(),
            search_path: "/data/graphql/ids".to_string(),
            search_query_id: "5eec1d8288aa8741918a2a5051d289ef".to_string(),
            result_selector: r#"div[data-test-target="restaurants-list"] > div"#.to_string(),
            link_selector: r#"a[href*="Restaurant_Review"]"#.to_string(),
            image_selector: "picture img".to_string(),
            sponsored_attribute: "data-sponsored".to_string(),
            total_results_selector: r#"span[data-test-target="results-count"]"#.to_string(),
            next_page_selector: r#"a[data-smoke-attr="pagination-next-arrow"]"#.to_string(),
            state_marker: "pageManifest:".to_string(),
            offset_token: "-oa".to_string(),
        }
    }
}

/// Headless browser configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BrowserConfig {
    /// Run without a visible window
    pub headless: bool,

    /// Explicit Chrome/Chromium executable; searched for when absent
    pub chrome_path: Option<String>,

    /// How long to wait for each condition before reloading (seconds)
    pub wait_timeout_secs: u64,

    /// Reloads attempted before the page is declared timed out
    pub max_reloads: u32,

    /// Element-presence conditions; entries starting with `/` are XPath, others CSS
    pub wait_for: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            wait_timeout_secs: 15,
            max_reloads: 3,
            wait_for: vec![r#"span[data-test-target="results-count"]"#.to_string()],
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Root directory for per-page snapshot files
    pub data_dir: String,

    /// Path to the SQLite mirror database
    pub database_path: String,
}
