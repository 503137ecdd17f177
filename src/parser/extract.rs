use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

use super::fragment::MarkupNode;
use crate::record::ListingRecord;

const VIEW_JOB_PREFIX: &str = "https://www.indeed.com/viewjob?jk=";
const SEARCH_QUERY_PREFIX: &str = "https://www.google.com/search?q=";
const QUERY_JOIN: &str = "+";
const DESCRIPTION_STYLE: &str =
    "list-style-type:circle;margin-top: 0px;margin-bottom: 0px;padding-left:20px;";

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("listing is missing required field `{field}`")]
    MissingField { field: &'static str },
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, ExtractError> {
    value.ok_or(ExtractError::MissingField { field })
}

/// Pull one listing out of its SERP card.
///
/// Identifier, title, company and location are required. Posted date and
/// description fall back to `""` when their elements are absent.
pub fn extract<N: MarkupNode>(fragment: &N, scrape_date: NaiveDate) -> Result<ListingRecord, ExtractError> {
    let header = required(fragment.find("a", Some("jcs-JobTitle")), "job_id")?;
    let external_id = required(header.attr("data-jk"), "job_id")?.to_string();

    let title = header
        .find("span", None)
        .and_then(|span| span.attr("title").map(str::to_string));
    let title = required(title, "title")?;

    let company = required(
        fragment.find_by_attr("span", "data-testid", "company-name"),
        "company",
    )?
    .text();
    let location = required(
        fragment.find_by_attr("div", "data-testid", "text-location"),
        "location",
    )?
    .text();

    let posted_date = fragment
        .find_by_attr("span", "data-testid", "myJobsStateDate")
        .map(|el| el.text().trim().to_string())
        .unwrap_or_default();

    let description = fragment
        .find_by_attr("ul", "style", DESCRIPTION_STYLE)
        .map(|ul| {
            ul.find_all("li")
                .iter()
                .map(MarkupNode::text)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    Ok(ListingRecord {
        source_url: source_url(&external_id),
        discovery_query_url: discovery_query_url(&company, &title),
        external_id,
        title,
        company,
        location,
        description,
        posted_date,
        // The SERP never shows an application deadline.
        due_date: String::new(),
        scrape_date,
    })
}

pub fn source_url(external_id: &str) -> String {
    format!("{}{}", VIEW_JOB_PREFIX, external_id)
}

/// Search-engine query for "<company> <title>", whitespace runs joined by `+`.
pub fn discovery_query_url(company: &str, title: &str) -> String {
    format!(
        "{}{}{}{}",
        SEARCH_QUERY_PREFIX,
        query_terms(company),
        QUERY_JOIN,
        query_terms(title)
    )
}

fn query_terms(s: &str) -> String {
    WHITESPACE_RE.replace_all(s.trim(), QUERY_JOIN).into_owned()
}
