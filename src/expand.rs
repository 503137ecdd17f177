use thiserror::Error;
use tracing::warn;

/// Results per SERP page; page `n` starts at `n * PAGE_SIZE`.
pub const PAGE_SIZE: u32 = 10;

const PAGINATION_ANCHOR: &str = "&vjk=";
const SCHEME_PREFIX: &str = "http";

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("search row {row}: page count {value:?} is not a whole number")]
    InvalidPageCount { row: usize, value: String },
}

/// One row of the search tab: a SERP URL and how many pages to walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSpec {
    pub base_url: String,
    pub page_count: u32,
}

impl SearchSpec {
    pub fn new(base_url: impl Into<String>, page_count: u32) -> Self {
        Self {
            base_url: base_url.into(),
            page_count,
        }
    }

    fn is_well_formed(&self) -> bool {
        self.base_url.starts_with(SCHEME_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginatedUrl {
    pub url: String,
    pub page_index: u32,
}

/// Build specs from the two parallel columns of the search tab.
///
/// Index 0 of each column is the header. Reading stops at the first URL
/// cell without a scheme; nothing after it is looked at, valid or not.
pub fn specs_from_columns(urls: &[String], pages: &[String]) -> Result<Vec<SearchSpec>, SpecError> {
    let mut specs = Vec::new();

    for (i, url) in urls.iter().enumerate().skip(1) {
        if !url.starts_with(SCHEME_PREFIX) {
            break;
        }
        let raw = pages.get(i).map(String::as_str).unwrap_or("");
        // Negative counts walk zero pages.
        let page_count = raw
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|n| u32::try_from(n.max(0)).ok())
            .ok_or_else(|| SpecError::InvalidPageCount {
                row: i + 1,
                value: raw.to_string(),
            })?;
        specs.push(SearchSpec::new(url.clone(), page_count));
    }

    Ok(specs)
}

/// Expand specs into the ordered list of SERP URLs to scrape.
///
/// Stops at the first malformed spec. A spec with `page_count == 0`
/// contributes nothing.
pub fn expand(specs: &[SearchSpec]) -> Vec<PaginatedUrl> {
    let mut out = Vec::new();

    for spec in specs.iter().take_while(|s| s.is_well_formed()) {
        if spec.page_count > 1 && !spec.base_url.contains(PAGINATION_ANCHOR) {
            warn!(
                "No pagination anchor in {}, all {} pages will repeat the same URL",
                spec.base_url, spec.page_count
            );
        }
        for page_index in 0..spec.page_count {
            out.push(PaginatedUrl {
                url: page_url(&spec.base_url, page_index),
                page_index,
            });
        }
    }

    out
}

/// URL of one SERP page. Page 0 is the base URL untouched.
pub fn page_url(base_url: &str, page_index: u32) -> String {
    let offset = u64::from(page_index) * u64::from(PAGE_SIZE);
    if offset == 0 {
        return base_url.to_string();
    }
    base_url.replace(PAGINATION_ANCHOR, &format!("&start={}{}", offset, PAGINATION_ANCHOR))
}
