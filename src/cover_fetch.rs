use reqwest::blocking::Client;
use serde::Deserialize;

use crate::http_client::http_client;
use crate::state::{ImageFormats, ImageObject};

#[derive(Debug, Deserialize)]
struct JikanAnimeResponse {
    #[serde(default)]
    data: Option<JikanAnime>,
}

#[derive(Debug, Deserialize)]
struct JikanAnime {
    #[serde(default)]
    images: Option<ImageFormats>,
}

pub fn cover_url(metadata_base: &str, mal_id: u64) -> String {
    let base = metadata_base.trim().trim_end_matches('/');
    format!("{base}/anime/{mal_id}")
}

/// Best-effort cover lookup. Every failure (client, network, status, body)
/// collapses to `None`.
pub fn resolve_cover(metadata_base: &str, mal_id: u64) -> Option<String> {
    let client = http_client().ok()?;
    resolve_cover_with(client, metadata_base, mal_id)
}

pub fn resolve_cover_with(client: &Client, metadata_base: &str, mal_id: u64) -> Option<String> {
    let url = cover_url(metadata_base, mal_id);
    let resp = client.get(&url).send().ok()?;
    if !resp.status().is_success() {
        return None;
    }
    let body = resp.text().ok()?;
    pick_cover_from_metadata(&body)
}

/// Large webp, then large jpg, then the default jpg.
pub fn pick_cover_from_metadata(raw: &str) -> Option<String> {
    let parsed: JikanAnimeResponse = serde_json::from_str(raw.trim()).ok()?;
    let images = parsed.data?.images?;
    first_present([
        images.webp.as_ref().and_then(|v| v.large_image_url.as_deref()),
        images.jpg.as_ref().and_then(|v| v.large_image_url.as_deref()),
        images.jpg.as_ref().and_then(|v| v.image_url.as_deref()),
    ])
}

/// Cover for a structured image object already present on a prediction row:
/// small webp, small jpg, default webp, default jpg.
pub fn pick_card_cover(object: &ImageObject) -> Option<String> {
    let images = object.images.as_ref()?;
    let webp = images.webp.as_ref();
    let jpg = images.jpg.as_ref();
    first_present([
        webp.and_then(|v| v.small_image_url.as_deref()),
        jpg.and_then(|v| v.small_image_url.as_deref()),
        webp.and_then(|v| v.image_url.as_deref()),
        jpg.and_then(|v| v.image_url.as_deref()),
    ])
}

fn first_present<const N: usize>(candidates: [Option<&str>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|url| !url.is_empty())
        .map(str::to_string)
}
