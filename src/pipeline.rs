use anyhow::Result;
use chrono::NaiveDate;
use indicatif::ProgressBar;
use tracing::{info, warn};

use crate::dedup;
use crate::expand::PaginatedUrl;
use crate::fetch::PageFetcher;
use crate::parser::{self, extract::ExtractError};
use crate::record::DuplicateStatus;
use crate::store::{self, ConsistencyWait, ListingStore, SheetRow};

/// One record written to the listings tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenRow {
    /// Position within its page's batch, from 0.
    pub ordinal: usize,
    pub row: usize,
    pub external_id: String,
    pub title: String,
    pub status: DuplicateStatus,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub urls: usize,
    /// Pages dropped because a listing card lacked a required field.
    pub failed: Vec<(String, ExtractError)>,
    pub written: Vec<WrittenRow>,
}

impl RunReport {
    pub fn new_count(&self) -> usize {
        self.count(DuplicateStatus::New)
    }

    pub fn duplicate_count(&self) -> usize {
        self.count(DuplicateStatus::Duplicate)
    }

    fn count(&self, status: DuplicateStatus) -> usize {
        self.written.iter().filter(|w| w.status == status).count()
    }

    pub fn print(&self) {
        println!(
            "Scraped {} pages ({} skipped): wrote {} listings ({} new, {} duplicate).",
            self.urls,
            self.failed.len(),
            self.written.len(),
            self.new_count(),
            self.duplicate_count(),
        );
        for (url, err) in &self.failed {
            println!("  skipped {}: {}", url, err);
        }
    }
}

/// Scrape every URL in order and append its listings to `store`.
///
/// Fetch and write failures end the run. A page whose cards cannot be
/// extracted is skipped whole and the run moves on to the next URL.
pub async fn run<F, S>(
    fetcher: &F,
    store: &mut S,
    urls: &[PaginatedUrl],
    scrape_date: NaiveDate,
    pb: &ProgressBar,
) -> Result<RunReport>
where
    F: PageFetcher,
    S: ListingStore,
{
    let mut report = RunReport::default();

    for page in urls {
        report.urls += 1;
        pb.suspend(|| println!("Scraping webpage {} ...", page.url));
        let html = fetcher.fetch(&page.url).await?;

        let records = match parser::extract_page(&html, scrape_date) {
            Ok(records) => records,
            Err(e) => {
                warn!("Skipping {}: {}", page.url, e);
                report.failed.push((page.url.clone(), e));
                pb.inc(1);
                continue;
            }
        };
        info!("Extracted {} listings from {}", records.len(), page.url);

        // Snapshot once per page; rows written below are not in it.
        let known_ids = store.known_ids()?;
        let tagged = dedup::tag(records, &known_ids);

        let mut row = store::next_insertion_row(&store.rows()?);
        for (ordinal, t) in tagged.iter().enumerate() {
            store.write_row(row, &SheetRow::from_record(t, row))?;
            pb.suspend(|| println!("Entering item {} at row: {} - {}", ordinal, row, t.record.title));
            report.written.push(WrittenRow {
                ordinal,
                row,
                external_id: t.record.external_id.clone(),
                title: t.record.title.clone(),
                status: t.status,
            });
            row += 1;
        }

        if let ConsistencyWait::Fixed(delay) = store.consistency_wait() {
            pb.suspend(|| {
                println!(
                    "Waiting {} seconds before the next URL so writes can settle",
                    delay.as_secs()
                )
            });
            tokio::time::sleep(delay).await;
        }
        store.refresh()?;
        pb.inc(1);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::expand::{expand, SearchSpec};
    use crate::store::{MemoryStore, ID_COLUMN};

    /// Serves canned markup by URL; unknown URLs fail like a dead network.
    struct StaticFetcher(HashMap<String, String>);

    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("connection refused: {}", url))
        }
    }

    fn card(id: &str, title: &str) -> String {
        format!(
            r#"<div class="slider_container">
                 <a class="jcs-JobTitle" data-jk="{id}"><span title="{title}">{title}</span></a>
                 <span data-testid="company-name">Acme</span>
                 <div data-testid="text-location">Remote</div>
               </div>"#
        )
    }

    fn serp(cards: &[String]) -> String {
        format!("<html><body>{}</body></html>", cards.concat())
    }

    fn fetcher(pages: &[(&str, String)]) -> StaticFetcher {
        StaticFetcher(pages.iter().map(|(u, h)| (u.to_string(), h.clone())).collect())
    }

    fn sheet(ids: &[&str]) -> MemoryStore {
        let mut header = vec![String::new(); 15];
        header[ID_COLUMN] = "job ID".into();
        let mut rows = vec![header];
        for id in ids {
            let mut r = vec![String::new(); 15];
            r[0] = format!("old {}", id);
            r[ID_COLUMN] = id.to_string();
            rows.push(r);
        }
        MemoryStore::with_rows(rows)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn page(url: &str) -> PaginatedUrl {
        PaginatedUrl {
            url: url.to_string(),
            page_index: 0,
        }
    }

    #[tokio::test]
    async fn tags_and_appends_after_existing_rows() {
        let f = fetcher(&[("https://x.test/1", serp(&[card("J1", "A"), card("J3", "B")]))]);
        let mut store = sheet(&["J1", "J2"]);

        let report = run(&f, &mut store, &[page("https://x.test/1")], date(), &ProgressBar::hidden())
            .await
            .unwrap();

        let got: Vec<(usize, usize, &str, DuplicateStatus)> = report
            .written
            .iter()
            .map(|w| (w.ordinal, w.row, w.external_id.as_str(), w.status))
            .collect();
        assert_eq!(
            got,
            vec![
                (0, 4, "J1", DuplicateStatus::Duplicate),
                (1, 5, "J3", DuplicateStatus::New),
            ]
        );
        assert_eq!(store.backing[3][3], "duplicate");
        assert_eq!(store.backing[4][8], "2024-05-01");
        assert_eq!(store.refreshes, 1);
    }

    #[tokio::test]
    async fn writes_into_first_gap() {
        let f = fetcher(&[("https://x.test/1", serp(&[card("J5", "A"), card("J6", "B")]))]);
        let mut store = sheet(&["J1", "J2"]);
        store.backing[1] = vec![String::new(); 15];
        store.refresh().unwrap();

        let report = run(&f, &mut store, &[page("https://x.test/1")], date(), &ProgressBar::hidden())
            .await
            .unwrap();

        let rows: Vec<usize> = report.written.iter().map(|w| w.row).collect();
        assert_eq!(rows, vec![2, 3]);
        // Row 3 ("J2") sat below the gap and is overwritten.
        assert_eq!(store.backing[2][ID_COLUMN], "J6");
    }

    #[tokio::test]
    async fn snapshot_is_per_page() {
        let specs = [SearchSpec::new("https://x.test/jobs?q=a&vjk=1", 2)];
        let urls = expand(&specs);
        let f = fetcher(&[
            (urls[0].url.as_str(), serp(&[card("J7", "A"), card("J7", "A again")])),
            (urls[1].url.as_str(), serp(&[card("J7", "A"), card("J8", "C")])),
        ]);
        let mut store = sheet(&[]);

        let report = run(&f, &mut store, &urls, date(), &ProgressBar::hidden()).await.unwrap();

        let statuses: Vec<DuplicateStatus> = report.written.iter().map(|w| w.status).collect();
        assert_eq!(
            statuses,
            vec![
                DuplicateStatus::New,
                DuplicateStatus::New,
                DuplicateStatus::Duplicate,
                DuplicateStatus::New,
            ]
        );
        let rows: Vec<usize> = report.written.iter().map(|w| w.row).collect();
        assert_eq!(rows, vec![2, 3, 4, 5]);
        assert_eq!(store.refreshes, 2);
    }

    #[tokio::test]
    async fn extraction_failure_skips_only_that_page() {
        let broken = serp(&[
            card("J1", "A"),
            r#"<div class="slider_container"><a class="jcs-JobTitle" data-jk="J2"><span title="B">B</span></a></div>"#.to_string(),
        ]);
        let f = fetcher(&[
            ("https://x.test/1", broken),
            ("https://x.test/2", serp(&[card("J3", "C")])),
        ]);
        let mut store = sheet(&[]);

        let report = run(
            &f,
            &mut store,
            &[page("https://x.test/1"), page("https://x.test/2")],
            date(),
            &ProgressBar::hidden(),
        )
        .await
        .unwrap();

        assert_eq!(report.urls, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "https://x.test/1");
        assert_eq!(report.failed[0].1, ExtractError::MissingField { field: "company" });
        let ids: Vec<&str> = report.written.iter().map(|w| w.external_id.as_str()).collect();
        assert_eq!(ids, vec!["J3"]);
        assert_eq!(store.backing.len(), 2);
    }

    #[tokio::test]
    async fn fetch_failure_halts_run() {
        let f = fetcher(&[("https://x.test/1", serp(&[card("J1", "A")]))]);
        let mut store = sheet(&[]);

        let err = run(
            &f,
            &mut store,
            &[page("https://x.test/1"), page("https://x.test/down"), page("https://x.test/1")],
            date(),
            &ProgressBar::hidden(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("connection refused"));
        // First page landed before the failure; nothing after it.
        assert_eq!(store.backing.len(), 2);
        assert_eq!(store.backing[1][ID_COLUMN], "J1");
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_wait_precedes_each_refresh() {
        let f = fetcher(&[
            ("https://x.test/1", serp(&[card("J1", "A")])),
            ("https://x.test/2", serp(&[card("J1", "A"), card("J2", "B")])),
        ]);
        let wait = Duration::from_secs(30);
        let mut store = sheet(&[]).with_wait(ConsistencyWait::Fixed(wait));
        let start = Instant::now();

        let report = run(
            &f,
            &mut store,
            &[page("https://x.test/1"), page("https://x.test/2")],
            date(),
            &ProgressBar::hidden(),
        )
        .await
        .unwrap();

        assert_eq!(start.elapsed().as_secs(), 60);
        let offsets: Vec<u64> = store
            .refreshed_at
            .iter()
            .map(|t| (*t - start).as_secs())
            .collect();
        assert_eq!(offsets, vec![30, 60]);
        // The second page saw the first page's row only after the wait and refresh.
        let statuses: Vec<DuplicateStatus> = report.written.iter().map(|w| w.status).collect();
        assert_eq!(
            statuses,
            vec![DuplicateStatus::New, DuplicateStatus::Duplicate, DuplicateStatus::New]
        );
        let rows: Vec<usize> = report.written.iter().map(|w| w.row).collect();
        assert_eq!(rows, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn empty_page_writes_nothing() {
        let f = fetcher(&[("https://x.test/1", serp(&[]))]);
        let mut store = sheet(&["J1"]);

        let report = run(&f, &mut store, &[page("https://x.test/1")], date(), &ProgressBar::hidden())
            .await
            .unwrap();

        assert!(report.written.is_empty());
        assert_eq!(store.backing.len(), 2);
        assert_eq!(store.refreshes, 1);
    }
}
