use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;

use crate::http_client::http_client;
use crate::state::{ImageField, ImageObject, PredictionRecord};

/// Non-success response from the prediction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("HTTP {status}")]
pub struct HttpStatusError {
    pub status: u16,
}

pub fn predictions_url(api_base: &str, year: &str, season: &str) -> String {
    let base = api_base.trim().trim_end_matches('/');
    format!("{base}/season/{year}/{season}/predictions")
}

pub fn fetch_predictions(
    api_base: &str,
    year: &str,
    season: &str,
) -> Result<Vec<PredictionRecord>> {
    let client = http_client()?;
    fetch_predictions_with(client, api_base, year, season)
}

pub fn fetch_predictions_with(
    client: &Client,
    api_base: &str,
    year: &str,
    season: &str,
) -> Result<Vec<PredictionRecord>> {
    let url = predictions_url(api_base, year, season);
    let resp = client
        .get(&url)
        .send()
        .with_context(|| format!("request to {url} failed"))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(HttpStatusError {
            status: status.as_u16(),
        }
        .into());
    }
    let body = resp.text().context("failed reading body")?;
    parse_predictions_json(&body)
}

/// Parses the predictions payload without validating its schema: any field
/// with an unexpected type is left empty rather than failing the whole list.
pub fn parse_predictions_json(raw: &str) -> Result<Vec<PredictionRecord>> {
    let root: Value = serde_json::from_str(raw.trim()).context("invalid predictions json")?;
    let Value::Array(items) = root else {
        return Err(anyhow!("predictions payload is not a list"));
    };
    Ok(items.iter().map(record_from_value).collect())
}

fn record_from_value(value: &Value) -> PredictionRecord {
    PredictionRecord {
        mal_id: value.get("mal_id").and_then(as_u64),
        title: value.get("title").and_then(as_string),
        year: value.get("year").and_then(as_i64),
        season: value.get("season").and_then(as_string),
        pred_score: value.get("pred_score").and_then(Value::as_f64),
        image_url: value.get("image_url").and_then(image_field),
    }
}

fn image_field(value: &Value) -> Option<ImageField> {
    match value {
        Value::String(url) => Some(ImageField::Url(url.clone())),
        Value::Object(_) => Some(ImageField::Object(
            serde_json::from_value::<ImageObject>(value.clone()).unwrap_or_default(),
        )),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}
