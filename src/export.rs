use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::state::{HydratedRecord, Season};

pub const CSV_HEADER: &str = "mal_id,title,year,season,pred_score,image_url";

pub fn export_filename(year: &str, season: Season) -> String {
    format!("predictions_{}_{}.csv", year.trim(), season.as_str())
}

/// Renders rows in the order given. Only `title` and `image_url` are quoted.
/// The header always ends with `\n`; rows are joined by `\n` with no trailing
/// newline.
pub fn predictions_csv<'a>(rows: impl IntoIterator<Item = &'a HydratedRecord>) -> String {
    let body = rows.into_iter().map(csv_row).collect::<Vec<_>>().join("\n");
    format!("{CSV_HEADER}\n{body}")
}

fn csv_row(row: &HydratedRecord) -> String {
    [
        row.id_label(),
        csv_quote(row.title.as_deref().unwrap_or("")),
        row.year.map(|year| year.to_string()).unwrap_or_default(),
        row.season.clone().unwrap_or_default(),
        row.pred_score.map(|score| score.to_string()).unwrap_or_default(),
        csv_quote(row.image_url.as_deref().unwrap_or("")),
    ]
    .join(",")
}

pub fn csv_quote(raw: &str) -> String {
    format!("\"{}\"", raw.replace('"', "\"\""))
}

pub fn write_predictions_csv(
    dir: &Path,
    year: &str,
    season: Season,
    rows: &[HydratedRecord],
) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create export dir {}", dir.display()))?;
    let path = dir.join(export_filename(year, season));
    let csv = predictions_csv(rows);
    fs::write(&path, csv).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_double_quotes() {
        assert_eq!(csv_quote(r#"He said "Hi""#), r#""He said ""Hi""""#);
        assert_eq!(csv_quote(""), r#""""#);
    }
}
