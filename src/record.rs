use chrono::NaiveDate;

pub const SCRAPE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateStatus {
    New,
    Duplicate,
}

impl DuplicateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DuplicateStatus::New => "new",
            DuplicateStatus::Duplicate => "duplicate",
        }
    }
}

/// One job listing scraped from a SERP.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    pub external_id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub posted_date: String,
    pub due_date: String,
    pub source_url: String,
    pub discovery_query_url: String,
    pub scrape_date: NaiveDate,
}

impl ListingRecord {
    pub fn scrape_date_label(&self) -> String {
        self.scrape_date.format(SCRAPE_DATE_FORMAT).to_string()
    }
}

/// A record after the known-ID check. Only these reach the listings tab.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedRecord {
    pub record: ListingRecord,
    pub status: DuplicateStatus,
}
