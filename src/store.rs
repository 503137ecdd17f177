use std::time::Duration;

use anyhow::Result;

use crate::record::TaggedRecord;

pub const COLUMN_COUNT: usize = 15;
/// Zero-based position of the job ID column (sheet column C).
pub const ID_COLUMN: usize = 2;

pub const HEADER: [&str; COLUMN_COUNT] = [
    "title",
    "company",
    "job ID",
    "new listing",
    "location",
    "description",
    "site URL",
    "google URL",
    "scraped date",
    "posted date",
    "category",
    "application due",
    "deadline",
    "applied",
    "connections",
];

// Sheet column letters the formula cells point at.
const COMPANY_COLUMN: &str = "B";
const APPLICATION_DUE_COLUMN: &str = "L";
const APPLIED_COLUMN: &str = "N";
const CATEGORIZATION_LOOKUP: &str = r#"companies!A:A,companies!K:K,"N/A",0,1"#;
const CONNECTIONS_LOOKUP: &str = "connections!$A:$A,connections!$C:$C";

/// How long writes take to become visible to reads of the same store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsistencyWait {
    #[default]
    None,
    Fixed(Duration),
}

/// The listings tab: a grid of text cells addressed by 1-based row number.
pub trait ListingStore {
    /// Every cell of the job ID column, header included, from the cached view.
    fn known_ids(&self) -> Result<Vec<String>>;
    /// All rows of the cached view, top to bottom.
    fn rows(&self) -> Result<Vec<Vec<String>>>;
    fn write_row(&mut self, row: usize, cells: &SheetRow) -> Result<()>;
    /// Reload the cached view from the backing store.
    fn refresh(&mut self) -> Result<()>;
    fn consistency_wait(&self) -> ConsistencyWait;
}

/// The 15 cells written for one listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow(pub [String; COLUMN_COUNT]);

impl SheetRow {
    pub fn header() -> Self {
        SheetRow(HEADER.map(str::to_string))
    }

    /// Lay a tagged record out at destination `row`.
    pub fn from_record(tagged: &TaggedRecord, row: usize) -> Self {
        let r = &tagged.record;
        SheetRow([
            r.title.clone(),
            r.company.clone(),
            r.external_id.clone(),
            tagged.status.as_str().to_string(),
            r.location.clone(),
            r.description.clone(),
            r.source_url.clone(),
            r.discovery_query_url.clone(),
            r.scrape_date_label(),
            r.posted_date.clone(),
            categorization_formula(row),
            r.due_date.clone(),
            deadline_formula(row),
            String::new(),
            connections_formula(row),
        ])
    }

    pub fn cells(&self) -> &[String] {
        &self.0
    }
}

pub fn categorization_formula(row: usize) -> String {
    format!("=XLOOKUP({}{},{})", COMPANY_COLUMN, row, CATEGORIZATION_LOOKUP)
}

pub fn connections_formula(row: usize) -> String {
    format!("=XLOOKUP({}{},{})", COMPANY_COLUMN, row, CONNECTIONS_LOOKUP)
}

pub fn deadline_formula(row: usize) -> String {
    let applied = format!("{}{}", APPLIED_COLUMN, row);
    let due = format!("{}{}", APPLICATION_DUE_COLUMN, row);
    format!(
        r#"=if(isblank({applied}),if(isblank({due}),"unknown",if({due}<today(),"past deadline","not due")),if({applied}="pass","pass","submitted"))"#
    )
}

/// 1-based index of the first fully-empty row, or one past the last row.
///
/// Non-empty rows below the first gap are ignored.
pub fn next_insertion_row<S: AsRef<str>>(rows: &[Vec<S>]) -> usize {
    rows.iter()
        .position(|row| row.iter().all(|cell| cell.as_ref().is_empty()))
        .unwrap_or(rows.len())
        + 1
}

/// In-memory listings tab with the same cached-view semantics as the
/// SQLite store.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub backing: Vec<Vec<String>>,
    view: Vec<Vec<String>>,
    pub refreshes: usize,
    /// Tokio clock reading at each refresh.
    pub refreshed_at: Vec<tokio::time::Instant>,
    wait: ConsistencyWait,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            view: rows.clone(),
            backing: rows,
            ..Self::default()
        }
    }

    pub fn with_wait(mut self, wait: ConsistencyWait) -> Self {
        self.wait = wait;
        self
    }
}

#[cfg(test)]
impl ListingStore for MemoryStore {
    fn known_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .view
            .iter()
            .map(|r| r.get(ID_COLUMN).cloned().unwrap_or_default())
            .collect())
    }

    fn rows(&self) -> Result<Vec<Vec<String>>> {
        Ok(self.view.clone())
    }

    fn write_row(&mut self, row: usize, cells: &SheetRow) -> Result<()> {
        anyhow::ensure!(row >= 1, "rows are 1-based, got {}", row);
        if self.backing.len() < row {
            self.backing.resize(row, Vec::new());
        }
        self.backing[row - 1] = cells.0.to_vec();
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        self.view = self.backing.clone();
        self.refreshes += 1;
        self.refreshed_at.push(tokio::time::Instant::now());
        Ok(())
    }

    fn consistency_wait(&self) -> ConsistencyWait {
        self.wait
    }
}
