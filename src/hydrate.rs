use anyhow::Result;
use rayon::prelude::*;

use crate::config::MAX_FETCH_PARALLELISM;
use crate::cover_fetch::pick_card_cover;
use crate::state::{HydratedRecord, ImageField, PredictionRecord};

/// Fetch, then fill in missing covers. A fetch error fails the refresh; cover
/// lookups cannot.
pub fn refresh_predictions<F, R>(
    fetch: F,
    parallelism: Option<usize>,
    resolve: R,
) -> Result<Vec<HydratedRecord>>
where
    F: FnOnce() -> Result<Vec<PredictionRecord>>,
    R: Fn(u64) -> Option<String> + Sync,
{
    let records = fetch()?;
    Ok(hydrate_records(records, parallelism, resolve))
}

/// Resolves every row without an image concurrently and returns only after
/// all lookups have settled. Output order matches input order.
pub fn hydrate_records<R>(
    records: Vec<PredictionRecord>,
    parallelism: Option<usize>,
    resolve: R,
) -> Vec<HydratedRecord>
where
    R: Fn(u64) -> Option<String> + Sync,
{
    let pending = pending_lookups(&records);
    if pending == 0 {
        return records
            .into_iter()
            .map(|record| hydrate_one(record, &resolve))
            .collect();
    }

    let threads = parallelism.unwrap_or(pending).clamp(1, MAX_FETCH_PARALLELISM);
    with_fetch_pool(threads, || {
        records
            .into_par_iter()
            .map(|record| hydrate_one(record, &resolve))
            .collect()
    })
}

pub fn pending_lookups(records: &[PredictionRecord]) -> usize {
    records
        .iter()
        .filter(|record| record.needs_cover() && record.mal_id.is_some())
        .count()
}

fn hydrate_one<R>(record: PredictionRecord, resolve: &R) -> HydratedRecord
where
    R: Fn(u64) -> Option<String>,
{
    let image_url = match &record.image_url {
        Some(ImageField::Url(url)) if !url.is_empty() => Some(url.clone()),
        Some(ImageField::Object(object)) => pick_card_cover(object),
        // Rows without an id have nothing to look up.
        _ => record.mal_id.and_then(resolve),
    };
    HydratedRecord::from_record(record, image_url)
}

fn with_fetch_pool<T>(threads: usize, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(action),
        Err(_) => action(),
    }
}
