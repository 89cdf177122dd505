use std::path::PathBuf;

use anyhow::{Result, anyhow};

use mal_predictions_terminal::config::AppConfig;
use mal_predictions_terminal::state::{Season, derive_view};
use mal_predictions_terminal::{cover_fetch, export, hydrate, predictions_fetch};

fn main() -> Result<()> {
    let mut config = AppConfig::load();
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    if let Some(base) = arg_value(&args, "--api-base") {
        config.api_base = base;
    }
    if let Some(year) = arg_value(&args, "--year") {
        config.year = year;
    }
    if let Some(raw) = arg_value(&args, "--season") {
        config.season = Season::parse(&raw)
            .ok_or_else(|| anyhow!("unknown season {raw:?} (winter|spring|summer|fall)"))?;
    }
    let out_dir = arg_value(&args, "--out")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.export_dir.clone());
    let query = arg_value(&args, "--query").unwrap_or_default();
    let sort_by_score = !args.iter().any(|arg| arg == "--original-order");

    let season = config.season.as_str();
    let url = predictions_fetch::predictions_url(&config.api_base, &config.year, season);
    println!("Fetching {url}");

    let records = hydrate::refresh_predictions(
        || predictions_fetch::fetch_predictions(&config.api_base, &config.year, season),
        config.fetch_parallelism,
        |mal_id| cover_fetch::resolve_cover(&config.jikan_base, mal_id),
    )?;

    let rows = derive_view(&records, &query, sort_by_score)
        .into_iter()
        .cloned()
        .collect::<Vec<_>>();
    let missing = rows.iter().filter(|row| row.image_url.is_none()).count();
    let path = export::write_predictions_csv(&out_dir, &config.year, config.season, &rows)?;

    println!("Predictions: {} fetched, {} exported", records.len(), rows.len());
    println!("Without cover: {missing}");
    println!("CSV: {}", path.display());
    Ok(())
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}
