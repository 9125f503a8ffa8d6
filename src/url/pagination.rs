//! Pagination arithmetic and next-page link rewriting

use regex::Regex;

/// Number of listing pages a scope spans
///
/// Computed as `ceil(total_results / results_on_first_page)`. Page 1 always
/// exists once it has been fetched, so the result is never below 1.
///
/// # Examples
///
/// ```
/// use dinescout::url::total_pages;
///
/// assert_eq!(total_pages(87, 30), 3);
/// assert_eq!(total_pages(90, 30), 3);
/// ```
pub fn total_pages(total_results: u32, results_on_first_page: u32) -> u32 {
    if results_on_first_page == 0 {
        return 1;
    }
    total_results.div_ceil(results_on_first_page).max(1)
}

/// Clamps a requested page count to what the scope actually has
///
/// A non-positive request means "every page".
pub fn page_budget(requested: i64, total_pages: u32) -> u32 {
    if requested <= 0 {
        return total_pages;
    }
    u32::try_from(requested)
        .unwrap_or(u32::MAX)
        .min(total_pages)
}

/// Reads the result offset carried by a next-page link
///
/// Page 1's next link points at page 2, so its offset is the site's page
/// size. Sponsored entries do not count towards it.
///
/// # Examples
///
/// ```
/// use dinescout::url::offset_step;
///
/// assert_eq!(offset_step("/Restaurants-g60745-oa30-Boston.html", "-oa"), Some(30));
/// assert_eq!(offset_step("/Restaurants-g60745-Boston.html", "-oa"), None);
/// ```
pub fn offset_step(link: &str, token: &str) -> Option<u32> {
    let pattern = Regex::new(&format!(r"{}(\d+)", regex::escape(token))).ok()?;
    pattern
        .captures(link)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
        .filter(|&step| step > 0)
}

/// Rewrites the offset segment of a next-page link to point at `page`
///
/// The link carries its result offset as `<token><n>` (for example
/// `-oa30`); page `p` starts at offset `(p - 1) * per_page`. Returns `None`
/// when the link has no offset segment to rewrite.
///
/// # Examples
///
/// ```
/// use dinescout::url::page_url;
///
/// let next = "/Restaurants-g60745-oa30-Boston.html";
/// assert_eq!(
///     page_url(next, "-oa", 4, 30).as_deref(),
///     Some("/Restaurants-g60745-oa90-Boston.html")
/// );
/// ```
pub fn page_url(template: &str, token: &str, page: u32, per_page: u32) -> Option<String> {
    let pattern = Regex::new(&format!(r"{}\d+", regex::escape(token))).ok()?;
    let found = pattern.find(template)?;
    let offset = page.saturating_sub(1).saturating_mul(per_page);

    Some(format!(
        "{}{}{}{}",
        &template[..found.start()],
        token,
        offset,
        &template[found.end()..]
    ))
}
