//! Parsing and serialization of the calendar document format.

use std::{
    collections::HashSet,
    io::{BufReader, Cursor},
};

use anyhow::Result;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use ical::{parser::ical::component::IcalEvent, IcalParser};

use crate::calendar::{BinCalendar, Category, Event, FORMAT};

static PROD_ID: [&str; 2] = ["Bin Collection Calendar", "bins-norwich"];
static STAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Maximum octets of content per physical line (RFC 5545 section 3.1).
const FOLD_WIDTH: usize = 75;

trait GetIcalProperty {
    fn get_ical_property_value(&self, name: &str) -> Option<&String>;
}

impl GetIcalProperty for IcalEvent {
    fn get_ical_property_value(&self, name: &str) -> Option<&String> {
        self.properties
            .iter()
            .find(|property| property.name == name)
            .and_then(|property| property.value.as_ref())
    }
}

/// Parse an existing calendar document.
///
/// Event blocks are read for their summary and all-day start date only. A
/// block missing either, carrying a summary that is not a known category or
/// duplicating an already-read key is dropped silently. Continuation lines
/// are unfolded by the parser before any field is extracted.
pub fn parse(ics: &str) -> Result<BinCalendar> {
    let parser = IcalParser::new(BufReader::new(Cursor::new(ics)));
    let mut calendar = BinCalendar::new();
    let mut seen = HashSet::new();
    for ical_calendar_result in parser {
        let ical_calendar = ical_calendar_result?;
        for ical_event in ical_calendar.events {
            let category_option = ical_event
                .get_ical_property_value("SUMMARY")
                .and_then(|summary| Category::from_label(summary));
            let date_option = ical_event
                .get_ical_property_value("DTSTART")
                .and_then(|dt_start| parse_date(dt_start));
            let (Some(category), Some(date)) = (category_option, date_option) else {
                continue;
            };
            if !seen.insert((category, date)) {
                continue;
            }
            let created_at = ical_event
                .get_ical_property_value("CREATED")
                .and_then(|created| parse_stamp(created));
            calendar.events.push(Event {
                category,
                date,
                created_at,
            });
        }
    }
    Ok(calendar)
}

/// Read the fixed-width year-month-day prefix of a date or date-time value.
fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        value.get(0..4)?.parse().ok()?,
        value.get(4..6)?.parse().ok()?,
        value.get(6..8)?.parse().ok()?,
    )
}

fn parse_stamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, STAMP_FORMAT)
        .ok()
        .map(|stamp| stamp.and_utc())
}

/// Serialize the full document: fixed header, one block per event in
/// document order, fixed footer.
///
/// `generated_at` becomes the `DTSTAMP` of every block; everything else is
/// determined by the document. Each event spans a single day, so its end
/// date is the exclusive day after its start date.
pub fn serialize(calendar: &BinCalendar, generated_at: DateTime<Utc>) -> String {
    let stamp = generated_at.format(STAMP_FORMAT).to_string();
    let mut lines = vec![
        String::from("BEGIN:VCALENDAR"),
        String::from("VERSION:2.0"),
        format!("PRODID:{}", prod_id()),
        String::from("CALSCALE:GREGORIAN"),
    ];
    for event in &calendar.events {
        lines.push(String::from("BEGIN:VEVENT"));
        lines.push(format!("UID:{}", event.uid()));
        lines.push(format!("DTSTAMP:{stamp}"));
        if let Some(created_at) = event.created_at {
            lines.push(format!("CREATED:{}", created_at.format(STAMP_FORMAT)));
        }
        lines.push(format!("DTSTART;VALUE=DATE:{}", event.date.format(FORMAT)));
        lines.push(format!(
            "DTEND;VALUE=DATE:{}",
            (event.date + Days::new(1)).format(FORMAT)
        ));
        lines.push(format!("SUMMARY:{}", event.category));
        lines.push(String::from("END:VEVENT"));
    }
    lines.push(String::from("END:VCALENDAR"));

    let mut document = String::new();
    for line in lines {
        document.push_str(&fold(&line));
        document.push_str("\r\n");
    }
    document
}

fn prod_id() -> String {
    format!("-//{}", PROD_ID.join("//"))
}

/// Fold a logical line into physical chunks of at most [`FOLD_WIDTH`] octets
/// of content, every continuation chunk prefixed with a single space.
///
/// Chunks are split on character boundaries so multi-byte content never
/// straddles a physical line.
fn fold(line: &str) -> String {
    if line.len() <= FOLD_WIDTH {
        return String::from(line);
    }
    let mut folded = String::with_capacity(line.len() + 3 * (line.len() / FOLD_WIDTH));
    let mut chunk_len = 0;
    for character in line.chars() {
        let char_len = character.len_utf8();
        if chunk_len + char_len > FOLD_WIDTH {
            folded.push_str("\r\n ");
            chunk_len = 0;
        }
        folded.push(character);
        chunk_len += char_len;
    }
    folded
}
