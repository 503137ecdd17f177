use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::store::{ConsistencyWait, ListingStore, SheetRow, COLUMN_COUNT, ID_COLUMN};

const LISTING_COLUMNS: [&str; COLUMN_COUNT] = [
    "title",
    "company",
    "job_id",
    "dup_status",
    "location",
    "description",
    "site_url",
    "google_url",
    "scraped_date",
    "posted_date",
    "category",
    "due_date",
    "deadline",
    "applied",
    "connections",
];

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    let cells: Vec<String> = LISTING_COLUMNS
        .iter()
        .map(|c| format!("{} TEXT NOT NULL DEFAULT ''", c))
        .collect();
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS target_urls (
            row_num INTEGER PRIMARY KEY,
            url     TEXT NOT NULL DEFAULT '',
            pages   TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS listings (
            row_num    INTEGER PRIMARY KEY,
            {},
            written_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_listings_job_id ON listings(job_id);

        INSERT OR IGNORE INTO target_urls (row_num, url, pages) VALUES (1, 'URL', 'pages');
        ",
        cells.join(",\n            ")
    ))?;

    let has_header: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM listings WHERE row_num = 1)",
        [],
        |r| r.get(0),
    )?;
    if !has_header {
        write_listing_row(conn, 1, &SheetRow::header())?;
    }
    Ok(())
}

// ── Search tab ──

/// The URL and page-count columns of the search tab, header cell first.
///
/// Row numbers missing from the table read as empty cells.
pub fn fetch_search_columns(conn: &Connection) -> Result<(Vec<String>, Vec<String>)> {
    let mut stmt = conn.prepare("SELECT row_num, url, pages FROM target_urls ORDER BY row_num")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, vec![row.get::<_, String>(1)?, row.get::<_, String>(2)?]))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut urls = Vec::new();
    let mut pages = Vec::new();
    for mut cells in densify(rows, 2) {
        pages.push(cells.pop().unwrap_or_default());
        urls.push(cells.pop().unwrap_or_default());
    }
    Ok((urls, pages))
}

/// Append a search row below the last one. Returns its row number.
pub fn insert_search(conn: &Connection, url: &str, pages: u32) -> Result<i64> {
    let row: i64 = conn.query_row(
        "SELECT COALESCE(MAX(row_num), 1) + 1 FROM target_urls",
        [],
        |r| r.get(0),
    )?;
    conn.execute(
        "INSERT INTO target_urls (row_num, url, pages) VALUES (?1, ?2, ?3)",
        rusqlite::params![row, url, pages.to_string()],
    )?;
    Ok(row)
}

// ── Listings tab ──

pub fn fetch_listing_rows(conn: &Connection) -> Result<Vec<Vec<String>>> {
    let sql = format!(
        "SELECT row_num, {} FROM listings ORDER BY row_num",
        LISTING_COLUMNS.join(", ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            let mut cells = Vec::with_capacity(COLUMN_COUNT);
            for i in 0..COLUMN_COUNT {
                cells.push(row.get::<_, String>(i + 1)?);
            }
            Ok((row.get::<_, i64>(0)?, cells))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(densify(rows, COLUMN_COUNT))
}

pub fn write_listing_row(conn: &Connection, row: usize, cells: &SheetRow) -> Result<()> {
    let placeholders: Vec<String> = (2..=COLUMN_COUNT + 1).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT OR REPLACE INTO listings (row_num, {}) VALUES (?1, {})",
        LISTING_COLUMNS.join(", "),
        placeholders.join(", ")
    );
    let row_num = i64::try_from(row).context("row number out of range")?;
    let mut params: Vec<&dyn rusqlite::ToSql> = vec![&row_num as &dyn rusqlite::ToSql];
    params.extend(cells.cells().iter().map(|c| c as &dyn rusqlite::ToSql));
    conn.execute(&sql, params.as_slice())
        .with_context(|| format!("Failed to write listings row {}", row))?;
    Ok(())
}

/// Expand sparse `(row_num, cells)` pairs into rows `1..=max`, filling gaps
/// with empty cells.
fn densify(rows: Vec<(i64, Vec<String>)>, width: usize) -> Vec<Vec<String>> {
    let mut out: Vec<Vec<String>> = Vec::new();
    for (row_num, cells) in rows {
        let Ok(idx) = usize::try_from(row_num - 1) else {
            continue;
        };
        if out.len() <= idx {
            out.resize(idx + 1, vec![String::new(); width]);
        }
        out[idx] = cells;
    }
    out
}

/// Listings tab backed by SQLite, read through a cached view.
pub struct SqliteStore<'c> {
    conn: &'c Connection,
    view: Vec<Vec<String>>,
    wait: ConsistencyWait,
}

impl<'c> SqliteStore<'c> {
    pub fn open(conn: &'c Connection, wait: ConsistencyWait) -> Result<Self> {
        let view = fetch_listing_rows(conn)?;
        Ok(Self { conn, view, wait })
    }
}

impl ListingStore for SqliteStore<'_> {
    fn known_ids(&self) -> Result<Vec<String>> {
        Ok(self.view.iter().map(|r| r[ID_COLUMN].clone()).collect())
    }

    fn rows(&self) -> Result<Vec<Vec<String>>> {
        Ok(self.view.clone())
    }

    fn write_row(&mut self, row: usize, cells: &SheetRow) -> Result<()> {
        anyhow::ensure!(row >= 1, "rows are 1-based, got {}", row);
        write_listing_row(self.conn, row, cells)
    }

    fn refresh(&mut self) -> Result<()> {
        self.view = fetch_listing_rows(self.conn)?;
        Ok(())
    }

    fn consistency_wait(&self) -> ConsistencyWait {
        self.wait
    }
}

// ── Overview ──

pub struct OverviewRow {
    pub row_num: i64,
    pub title: String,
    pub company: String,
    pub job_id: String,
    pub status: String,
    pub location: String,
    pub scraped_date: String,
}

pub fn fetch_overview(conn: &Connection, status: Option<&str>, limit: usize) -> Result<Vec<OverviewRow>> {
    let where_clause = if status.is_some() {
        " AND dup_status = ?1"
    } else {
        ""
    };
    let sql = format!(
        "SELECT row_num, title, company, job_id, dup_status, location, scraped_date
         FROM listings
         WHERE row_num > 1 AND job_id != ''{}
         ORDER BY row_num DESC
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<OverviewRow> {
        Ok(OverviewRow {
            row_num: row.get(0)?,
            title: row.get(1)?,
            company: row.get(2)?,
            job_id: row.get(3)?,
            status: row.get(4)?,
            location: row.get(5)?,
            scraped_date: row.get(6)?,
        })
    };
    let rows = match status {
        Some(s) => stmt.query_map([s], map_row)?.collect::<Result<Vec<_>, _>>()?,
        None => stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?,
    };
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub searches: usize,
    pub listings: usize,
    pub new: usize,
    pub duplicates: usize,
    pub unique_ids: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let searches: usize = conn.query_row(
        "SELECT COUNT(*) FROM target_urls WHERE row_num > 1 AND url != ''",
        [],
        |r| r.get(0),
    )?;
    let listings: usize = conn.query_row(
        "SELECT COUNT(*) FROM listings WHERE row_num > 1 AND job_id != ''",
        [],
        |r| r.get(0),
    )?;
    let new: usize = conn.query_row(
        "SELECT COUNT(*) FROM listings WHERE row_num > 1 AND dup_status = 'new'",
        [],
        |r| r.get(0),
    )?;
    let duplicates: usize = conn.query_row(
        "SELECT COUNT(*) FROM listings WHERE row_num > 1 AND dup_status = 'duplicate'",
        [],
        |r| r.get(0),
    )?;
    let unique_ids: usize = conn.query_row(
        "SELECT COUNT(DISTINCT job_id) FROM listings WHERE row_num > 1 AND job_id != ''",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        searches,
        listings,
        new,
        duplicates,
        unique_ids,
    })
}
