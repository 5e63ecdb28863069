use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use dotenv::dotenv;
use log::{info, initialize_logger};
use structopt::StructOpt;
use time::OffsetDateTime;

use food_diary::cache::{FileStore, LocalCache};
use food_diary::config::get_variable;
use food_diary::export::{export_filename, rows_to_csv, sheet_rows, to_csv};
use food_diary::history::sort_newest_first;

#[derive(Debug, StructOpt)]
#[structopt(name = "export-csv", about = "Write the cached diary entries to a CSV file")]
struct Opt {
    /// The cache file to read; defaults to FOOD_DIARY_CACHE_PATH
    #[structopt(long, parse(from_os_str))]
    cache: Option<PathBuf>,

    /// Where to write the CSV; defaults to a date-stamped file in the current directory
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,

    /// Write rows in the spreadsheet layout instead, for manual import
    #[structopt(long)]
    sheet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let opt = Opt::from_args();

    let logger = Arc::new(initialize_logger());

    let cache_path = opt
        .cache
        .unwrap_or_else(|| PathBuf::from(get_variable("FOOD_DIARY_CACHE_PATH")));
    let cache = LocalCache::new(Arc::new(FileStore::open(&cache_path)?), logger.clone());

    let mut entries = cache.entries();
    sort_newest_first(&mut entries);

    let now = OffsetDateTime::now_utc();
    let csv = if opt.sheet {
        rows_to_csv(&sheet_rows(&entries, now))
    } else {
        to_csv(&entries)
    };

    let output = opt
        .output
        .unwrap_or_else(|| PathBuf::from(export_filename(now.date())));

    tokio::fs::write(&output, csv).await?;

    info!(logger, "Exported {} entries", entries.len(); "output" => %output.display());

    Ok(())
}
