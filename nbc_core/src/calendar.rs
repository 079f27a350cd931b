//! The calendar document and its merge and prune operations.

use std::{collections::HashSet, fmt};

use anyhow::{bail, Result};
use bitmask_enum::bitmask;
use chrono::{DateTime, Days, NaiveDate, Utc};

pub(crate) static FORMAT: &str = "%Y%m%d";

static UID_NAMESPACE: &str = "bins-norwich";

/// The closed set of collection services tracked in the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Domestic,
    Food,
    Garden,
    Recycling,
}

impl Category {
    /// Derive the category from a service label matched on the page.
    ///
    /// Only the first word of the label is significant and it is matched
    /// case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        let word = label.split_whitespace().next()?;
        [Self::Domestic, Self::Food, Self::Garden, Self::Recycling]
            .into_iter()
            .find(|category| word.eq_ignore_ascii_case(category.summary()))
    }

    /// The capitalized form used as the event summary.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::Domestic => "Domestic",
            Self::Food => "Food",
            Self::Garden => "Garden",
            Self::Recycling => "Recycling",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.summary())
    }
}

#[bitmask]
pub enum CategoryBitmask {
    Domestic,
    Food,
    Garden,
    Recycling,
}

impl From<Category> for CategoryBitmask {
    fn from(value: Category) -> Self {
        match value {
            Category::Domestic => CategoryBitmask::Domestic,
            Category::Food => CategoryBitmask::Food,
            Category::Garden => CategoryBitmask::Garden,
            Category::Recycling => CategoryBitmask::Recycling,
        }
    }
}

/// A single extracted collection fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Collection {
    pub category: Category,
    pub date: NaiveDate,
}

/// One collection occurrence stored in the calendar document.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub category: Category,
    pub date: NaiveDate,
    /// When the event was first merged into the document. `None` for events
    /// read from a document that does not carry a `CREATED` field.
    pub created_at: Option<DateTime<Utc>>,
}

impl Event {
    /// Get the unique id of a collection of a specific category on a
    /// specific date.
    ///
    /// Changing this function is a breaking change!
    pub fn uid(&self) -> String {
        format!(
            "{}_{}@{}",
            self.category,
            self.date.format(FORMAT),
            UID_NAMESPACE
        )
    }

    pub fn key(&self) -> (Category, NaiveDate) {
        (self.category, self.date)
    }
}

/// How many days of past collections survive a prune.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    KeepAll,
    KeepDays(u64),
}

impl RetentionPolicy {
    /// Build a policy from the configured day count.
    ///
    /// `-1` keeps everything, `0` keeps only today and future dates and any
    /// other non-negative `n` keeps the last `n` days.
    pub fn from_days(days: i64) -> Result<Self> {
        match days {
            -1 => Ok(Self::KeepAll),
            days if days >= 0 => Ok(Self::KeepDays(days as u64)),
            days => bail!("retention must be -1 or greater, got {days}"),
        }
    }

    /// The oldest date retained, or `None` when nothing is pruned.
    fn cutoff(&self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::KeepAll => None,
            Self::KeepDays(days) => today.checked_sub_days(Days::new(*days)),
        }
    }
}

/// The calendar document: events in insertion order, unique per
/// `(category, date)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinCalendar {
    pub events: Vec<Event>,
}

impl BinCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// The dedup keys of all events currently in the document.
    pub fn keys(&self) -> HashSet<(Category, NaiveDate)> {
        self.events.iter().map(Event::key).collect()
    }

    /// Append every fact not yet present, stamped with `now`.
    ///
    /// Facts whose key already exists are skipped without touching the
    /// stored event. Returns the number of events added, so a second merge
    /// of the same facts returns `0`.
    pub fn merge(&mut self, collections: &[Collection], now: DateTime<Utc>) -> usize {
        let mut existing = self.keys();
        let mut added = 0;
        for collection in collections {
            if !existing.insert((collection.category, collection.date)) {
                continue;
            }
            self.events.push(Event {
                category: collection.category,
                date: collection.date,
                created_at: Some(now),
            });
            added += 1;
        }
        added
    }

    /// Remove every event strictly older than the policy's cutoff.
    ///
    /// An event exactly at the cutoff is retained and retained events are
    /// not modified. Returns the number of events removed.
    pub fn prune(&mut self, policy: RetentionPolicy, today: NaiveDate) -> usize {
        let Some(cutoff) = policy.cutoff(today) else {
            return 0;
        };
        let before = self.events.len();
        self.events.retain(|event| event.date >= cutoff);
        before - self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::calendar::{BinCalendar, Category, Collection, Event, RetentionPolicy};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn facts() -> Vec<Collection> {
        vec![
            Collection {
                category: Category::Food,
                date: date(2024, 3, 1),
            },
            Collection {
                category: Category::Recycling,
                date: date(2024, 3, 8),
            },
        ]
    }

    #[test]
    fn test_from_label() {
        assert_eq!(Category::from_label("Domestic"), Some(Category::Domestic));
        assert_eq!(Category::from_label("food"), Some(Category::Food));
        assert_eq!(
            Category::from_label("GARDEN Waste Collection Service"),
            Some(Category::Garden)
        );
        assert_eq!(Category::from_label("Recycling"), Some(Category::Recycling));
        assert_eq!(Category::from_label("Doctor appointment"), None);
        assert_eq!(Category::from_label(""), None);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut calendar = BinCalendar::new();
        let now = Utc.with_ymd_and_hms(2024, 2, 28, 6, 0, 0).unwrap();
        assert_eq!(calendar.merge(&facts(), now), 2);
        let snapshot = calendar.clone();

        let later = Utc.with_ymd_and_hms(2024, 2, 29, 6, 0, 0).unwrap();
        assert_eq!(calendar.merge(&facts(), later), 0);
        assert_eq!(calendar, snapshot);
    }

    #[test]
    fn test_merge_collapses_duplicate_facts() {
        let mut calendar = BinCalendar::new();
        let now = Utc.with_ymd_and_hms(2024, 2, 28, 6, 0, 0).unwrap();
        let fact = Collection {
            category: Category::Garden,
            date: date(2024, 4, 2),
        };
        assert_eq!(calendar.merge(&[fact, fact], now), 1);
        assert_eq!(calendar.events.len(), 1);
    }

    #[test]
    fn test_merge_keeps_insertion_order() {
        let mut calendar = BinCalendar::new();
        let now = Utc.with_ymd_and_hms(2024, 2, 28, 6, 0, 0).unwrap();
        calendar.merge(&facts(), now);
        let order: Vec<Category> = calendar.events.iter().map(|event| event.category).collect();
        assert_eq!(order, vec![Category::Food, Category::Recycling]);
    }

    #[test]
    fn test_uid_is_deterministic() {
        let event = Event {
            category: Category::Food,
            date: date(2024, 3, 1),
            created_at: None,
        };
        assert_eq!(event.uid(), "Food_20240301@bins-norwich");
        assert_eq!(event.uid(), event.uid());
    }

    #[test]
    fn test_uid_differs_per_key() {
        let categories = [
            Category::Domestic,
            Category::Food,
            Category::Garden,
            Category::Recycling,
        ];
        let mut uids = HashSet::new();
        for category in categories {
            for day in 1..=5 {
                let event = Event {
                    category,
                    date: date(2024, 3, day),
                    created_at: None,
                };
                assert!(uids.insert(event.uid()));
            }
        }
    }

    #[test]
    fn test_prune_boundary() {
        let mut calendar = BinCalendar::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 6, 0, 0).unwrap();
        calendar.merge(
            &[
                Collection {
                    category: Category::Food,
                    date: date(2024, 1, 2),
                },
                Collection {
                    category: Category::Garden,
                    date: date(2024, 1, 3),
                },
                Collection {
                    category: Category::Recycling,
                    date: date(2024, 1, 10),
                },
            ],
            now,
        );

        let removed = calendar.prune(RetentionPolicy::KeepDays(7), date(2024, 1, 10));
        assert_eq!(removed, 1);
        let keys = calendar.keys();
        assert!(!keys.contains(&(Category::Food, date(2024, 1, 2))));
        assert!(keys.contains(&(Category::Garden, date(2024, 1, 3))));
        assert!(keys.contains(&(Category::Recycling, date(2024, 1, 10))));
    }

    #[test]
    fn test_prune_keep_none_retains_today() {
        let mut calendar = BinCalendar::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 6, 0, 0).unwrap();
        calendar.merge(
            &[
                Collection {
                    category: Category::Food,
                    date: date(2024, 1, 9),
                },
                Collection {
                    category: Category::Garden,
                    date: date(2024, 1, 10),
                },
            ],
            now,
        );

        let removed = calendar.prune(RetentionPolicy::KeepDays(0), date(2024, 1, 10));
        assert_eq!(removed, 1);
        assert_eq!(
            calendar.keys(),
            HashSet::from([(Category::Garden, date(2024, 1, 10))])
        );
    }

    #[test]
    fn test_prune_keep_all_removes_nothing() {
        let mut calendar = BinCalendar::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 6, 0, 0).unwrap();
        calendar.merge(
            &[Collection {
                category: Category::Domestic,
                date: date(1999, 1, 1),
            }],
            now,
        );

        assert_eq!(calendar.prune(RetentionPolicy::KeepAll, date(2024, 1, 10)), 0);
        assert_eq!(calendar.events.len(), 1);
    }

    #[test]
    fn test_prune_leaves_retained_events_untouched() {
        let mut calendar = BinCalendar::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 6, 0, 0).unwrap();
        calendar.merge(
            &[
                Collection {
                    category: Category::Food,
                    date: date(2024, 1, 1),
                },
                Collection {
                    category: Category::Garden,
                    date: date(2024, 1, 10),
                },
            ],
            now,
        );
        let retained = calendar.events[1].clone();

        calendar.prune(RetentionPolicy::KeepDays(0), date(2024, 1, 10));
        assert_eq!(calendar.events, vec![retained]);
    }

    #[test]
    fn test_prune_discards_freshly_merged_past_event() {
        let mut calendar = BinCalendar::new();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 6, 0, 0).unwrap();
        assert_eq!(
            calendar.merge(
                &[Collection {
                    category: Category::Food,
                    date: date(2024, 1, 1),
                }],
                now,
            ),
            1
        );
        assert_eq!(calendar.prune(RetentionPolicy::KeepDays(0), date(2024, 6, 1)), 1);
        assert!(calendar.events.is_empty());
    }

    #[test]
    fn test_retention_policy_from_days() {
        assert_eq!(
            RetentionPolicy::from_days(-1).unwrap(),
            RetentionPolicy::KeepAll
        );
        assert_eq!(
            RetentionPolicy::from_days(0).unwrap(),
            RetentionPolicy::KeepDays(0)
        );
        assert_eq!(
            RetentionPolicy::from_days(7).unwrap(),
            RetentionPolicy::KeepDays(7)
        );
        assert!(RetentionPolicy::from_days(-2).is_err());
    }
}
