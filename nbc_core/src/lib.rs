//! This crate implements the calendar side of a bin-collection scraper for
//! <https://bnr-wrp.whitespacews.com/>.
//!
//! A captured page snapshot is reduced to `(category, date)` collection facts
//! which are merged into a persistent iCalendar file. Merging is idempotent,
//! old collections are pruned by a retention policy and the file is only
//! rewritten when a cycle actually changed it.

pub use ical;

pub mod calendar;
pub mod codec;
pub mod extractor;
pub mod sync;
