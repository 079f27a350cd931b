use std::{env::current_dir, fs::read_to_string, path::PathBuf};

use anyhow::Result;
use clap::Parser;
use nbc_core::{
    calendar::{CategoryBitmask, RetentionPolicy},
    extractor, sync,
};

#[derive(Debug, Parser)]
pub struct Arguments {
    /// the captured page snapshot to extract collection dates from
    pub snapshot: PathBuf,
    /// the calendar file to synchronize, defaults to bins.ics in the current directory
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// days of past collections to keep, -1 keeps everything
    #[arg(long, default_value_t = -1)]
    pub retention_days: i64,
    /// exclude domestic waste collection dates
    #[arg(long)]
    pub exclude_domestic: bool,
    /// exclude food waste collection dates
    #[arg(long)]
    pub exclude_food: bool,
    /// exclude garden waste collection dates
    #[arg(long)]
    pub exclude_garden: bool,
    /// exclude recycling collection dates
    #[arg(long)]
    pub exclude_recycling: bool,
}

impl From<&Arguments> for CategoryBitmask {
    fn from(value: &Arguments) -> Self {
        let mut category_bitmask = CategoryBitmask::none();
        if value.exclude_domestic {
            category_bitmask |= CategoryBitmask::Domestic;
        }
        if value.exclude_food {
            category_bitmask |= CategoryBitmask::Food;
        }
        if value.exclude_garden {
            category_bitmask |= CategoryBitmask::Garden;
        }
        if value.exclude_recycling {
            category_bitmask |= CategoryBitmask::Recycling;
        }
        category_bitmask
    }
}

fn main() -> Result<()> {
    let args = Arguments::parse();
    let retention = RetentionPolicy::from_days(args.retention_days)?;
    let excluded = CategoryBitmask::from(&args);

    let snapshot = read_to_string(&args.snapshot)?;
    let mut collections = extractor::extract(&snapshot)?;
    collections.retain(|collection| !excluded.contains(CategoryBitmask::from(collection.category)));

    let path = match args.output {
        Some(path) => path,
        None => {
            let mut path = current_dir()?;
            path.push("bins.ics");
            path
        }
    };
    let report = sync::synchronize(&path, &collections, retention)?;
    println!(
        "added {}, pruned {}, {}",
        report.added,
        report.pruned,
        if report.written {
            "calendar written"
        } else {
            "calendar unchanged"
        }
    );
    Ok(())
}
