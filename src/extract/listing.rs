//! Listing page parsing
//!
//! A listing page contributes three things: the result entries themselves, the
//! declared total result count, and the link to the next page.

use crate::config::SiteConfig;
use crate::extract::{selector, ExtractionError};
use crate::model::ListingSummary;
use scraper::{ElementRef, Html};

/// Pagination facts declared by a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMeta {
    /// Total results the site claims for this scope
    pub total_results: u32,

    /// Raw href of the next-page link, if the page has one
    pub next_page: Option<String>,
}

/// Extracts one summary per non-sponsored result entry
///
/// Links and image sources are returned exactly as they appear in the markup;
/// resolving them against the site root is the caller's concern.
///
/// # Example
///
/// ```
/// use dinescout::config::SiteConfig;
/// use dinescout::extract::parse_listing_page;
///
/// let site = SiteConfig {
///     result_selector: "div.card".to_string(),
///     link_selector: "a".to_string(),
///     image_selector: "img".to_string(),
///     ..SiteConfig::default()
/// };
/// let html = r#"<div class="card"><a href="/Restaurant_Review-d1.html">Joe's</a></div>"#;
/// let rows = parse_listing_page(html, &site).unwrap();
/// assert_eq!(rows[0].detail_url, "/Restaurant_Review-d1.html");
/// ```
pub fn parse_listing_page(
    html: &str,
    site: &SiteConfig,
) -> Result<Vec<ListingSummary>, ExtractionError> {
    let document = Html::parse_document(html);
    let result_sel = selector(&site.result_selector)?;
    let link_sel = selector(&site.link_selector)?;
    let image_sel = selector(&site.image_selector)?;

    let mut summaries = Vec::new();

    for entry in document.select(&result_sel) {
        if is_sponsored(&entry, &site.sponsored_attribute) {
            continue;
        }

        let detail_url = entry
            .select(&link_sel)
            .find_map(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .ok_or_else(|| ExtractionError::Missing("detailUrl".to_string()))?;

        let images = entry
            .select(&image_sel)
            .filter_map(image_source)
            .map(str::to_string)
            .collect();

        summaries.push(ListingSummary {
            detail_url: detail_url.to_string(),
            images,
        });
    }

    Ok(summaries)
}

/// Extracts the declared total result count and the next-page link
pub fn parse_page_meta(html: &str, site: &SiteConfig) -> Result<PageMeta, ExtractionError> {
    let document = Html::parse_document(html);
    let total_sel = selector(&site.total_results_selector)?;
    let next_sel = selector(&site.next_page_selector)?;

    let total_text: String = document
        .select(&total_sel)
        .next()
        .ok_or_else(|| ExtractionError::Missing("totalResults".to_string()))?
        .text()
        .collect();

    let total_results = parse_count(&total_text)
        .ok_or_else(|| ExtractionError::shape("totalResults", total_text.trim()))?;

    let next_page = document
        .select(&next_sel)
        .find_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty());

    Ok(PageMeta {
        total_results,
        next_page,
    })
}

/// Sponsored entries carry the marker attribute on themselves or a descendant
fn is_sponsored(entry: &ElementRef<'_>, attribute: &str) -> bool {
    entry.value().attr(attribute).is_some()
        || entry
            .descendants()
            .filter_map(ElementRef::wrap)
            .any(|el| el.value().attr(attribute).is_some())
}

/// Lazy-loaded images keep the real URL in `data-src`
fn image_source<'a>(img: ElementRef<'a>) -> Option<&'a str> {
    let el = img.value();
    [el.attr("data-src"), el.attr("src")]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|src| !src.is_empty() && !src.starts_with("data:"))
}

/// Reads the first run of digits, ignoring thousands separators ("1,204 results")
fn parse_count(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
