//! URL handling for Dinescout
//!
//! Site links arrive as root-relative paths; this module resolves them against
//! the configured site root, rewrites pagination links, and turns location
//! names into filesystem-safe slugs.

mod pagination;

pub use pagination::{offset_step, page_budget, page_url, total_pages};

use url::Url;

/// Resolves `href` against `base`, leaving absolute URLs untouched
///
/// # Examples
///
/// ```
/// use dinescout::url::absolute;
///
/// let url = absolute("https://www.example.com", "/Restaurants-g1.html").unwrap();
/// assert_eq!(url, "https://www.example.com/Restaurants-g1.html");
/// ```
pub fn absolute(base: &str, href: &str) -> Result<String, url::ParseError> {
    let base = Url::parse(base)?;
    Ok(base.join(href.trim())?.to_string())
}

/// Converts a location name into a lowercase, dash-separated directory name
///
/// Runs of anything other than ASCII letters and digits collapse to a single
/// dash, and leading/trailing dashes are dropped. An empty result becomes
/// `"location"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "location".to_string()
    } else {
        slug
    }
}
