pub mod extract;
pub mod fragment;

use std::sync::LazyLock;

use chrono::NaiveDate;
use scraper::{Html, Selector};

use crate::record::ListingRecord;
use extract::ExtractError;
use fragment::ElementNode;

static LISTING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".slider_container").unwrap());

/// Two-step pipeline: SERP markup → listing cards → records.
///
/// The first card that fails required-field extraction fails the whole page.
pub fn extract_page(html: &str, scrape_date: NaiveDate) -> Result<Vec<ListingRecord>, ExtractError> {
    let doc = Html::parse_document(html);
    doc.select(&LISTING_SEL)
        .map(|card| extract::extract(&ElementNode(card), scrape_date))
        .collect()
}
