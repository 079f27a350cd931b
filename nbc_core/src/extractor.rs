//! Extraction of collection facts from a captured page snapshot.

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;

use crate::calendar::{Category, Collection};

static SERVICE_PATTERN: &str = r"(?is)\b(?P<date>\d{2}/\d{2}/\d{4})\b.*?\b(?P<service>Domestic|Food|Garden|Recycling)\b.*?Collection Service";
static DATE_FORMAT: &str = "%d/%m/%Y";

/// Extract every `(category, date)` collection fact from raw page text.
///
/// Facts are returned in first-occurrence order with duplicate pairs
/// collapsed, and zero matches is a valid empty result. A matched date that
/// is not a real calendar day fails the whole extraction: a half-parseable
/// page means the source layout changed.
pub fn extract(text: &str) -> Result<Vec<Collection>> {
    let service_regex = Regex::new(SERVICE_PATTERN).unwrap();
    let mut seen = HashSet::new();
    let mut collections = vec![];
    for captures in service_regex.captures_iter(text) {
        let raw_date = &captures["date"];
        let label = &captures["service"];
        let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT)
            .with_context(|| format!("unparseable collection date {raw_date:?}"))?;
        let category = Category::from_label(label)
            .with_context(|| format!("unrecognized service label {label:?}"))?;
        let collection = Collection { category, date };
        if seen.insert(collection) {
            collections.push(collection);
        }
    }
    Ok(collections)
}
