use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::predictions_fetch::predictions_url;

pub const MAL_ANIME_URL: &str = "https://myanimelist.net/anime";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

pub const SEASONS: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Fall];

impl Season {
    pub fn as_str(self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        SEASONS
            .into_iter()
            .find(|season| season.as_str().eq_ignore_ascii_case(raw))
    }

    pub fn next(self) -> Self {
        match self {
            Season::Winter => Season::Spring,
            Season::Spring => Season::Summer,
            Season::Summer => Season::Fall,
            Season::Fall => Season::Winter,
        }
    }
}

/// One size family of a cover (`images.webp` or `images.jpg`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImageVariant {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub small_image_url: Option<String>,
    #[serde(default)]
    pub large_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImageFormats {
    #[serde(default)]
    pub webp: Option<ImageVariant>,
    #[serde(default)]
    pub jpg: Option<ImageVariant>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImageObject {
    #[serde(default)]
    pub images: Option<ImageFormats>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageField {
    Url(String),
    Object(ImageObject),
}

/// A prediction row as the service sent it. Fields with an unexpected type
/// are kept as `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionRecord {
    pub mal_id: Option<u64>,
    pub title: Option<String>,
    pub year: Option<i64>,
    pub season: Option<String>,
    pub pred_score: Option<f64>,
    pub image_url: Option<ImageField>,
}

impl PredictionRecord {
    /// True when the row carries no usable image at all and a cover lookup
    /// is needed. A structured image object never triggers a lookup.
    pub fn needs_cover(&self) -> bool {
        match &self.image_url {
            None => true,
            Some(ImageField::Url(url)) => url.is_empty(),
            Some(ImageField::Object(_)) => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HydratedRecord {
    pub mal_id: Option<u64>,
    pub title: Option<String>,
    pub year: Option<i64>,
    pub season: Option<String>,
    pub pred_score: Option<f64>,
    pub image_url: Option<String>,
}

impl HydratedRecord {
    pub fn from_record(record: PredictionRecord, image_url: Option<String>) -> Self {
        Self {
            mal_id: record.mal_id,
            title: record.title,
            year: record.year,
            season: record.season,
            pred_score: record.pred_score,
            image_url: image_url.filter(|url| !url.is_empty()),
        }
    }

    pub fn id_label(&self) -> String {
        self.mal_id.map(|id| id.to_string()).unwrap_or_default()
    }

    pub fn title_label(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    /// Sort key. Adding zero folds `-0.0` into `0.0` so both tie with a
    /// missing score under `total_cmp`.
    pub fn score_or_zero(&self) -> f64 {
        self.pred_score.unwrap_or(0.0) + 0.0
    }

    pub fn score_label(&self) -> String {
        self.pred_score
            .map(|score| format!("{score:.2}"))
            .unwrap_or_default()
    }

    pub fn mal_url(&self) -> Option<String> {
        self.mal_id.map(|id| format!("{MAL_ANIME_URL}/{id}"))
    }

    /// Rendering key; positional so duplicate ids stay distinct.
    pub fn row_key(&self, index: usize) -> String {
        format!("{}-{index}", self.id_label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBadge {
    Excellent,
    Great,
    Good,
    Fair,
    Mixed,
    Poor,
}

pub fn score_badge(score: Option<f64>) -> ScoreBadge {
    let score = score.unwrap_or(0.0);
    if score >= 8.5 {
        ScoreBadge::Excellent
    } else if score >= 8.0 {
        ScoreBadge::Great
    } else if score >= 7.5 {
        ScoreBadge::Good
    } else if score >= 7.0 {
        ScoreBadge::Fair
    } else if score >= 6.5 {
        ScoreBadge::Mixed
    } else {
        ScoreBadge::Poor
    }
}

pub fn badge_label(badge: ScoreBadge) -> &'static str {
    match badge {
        ScoreBadge::Excellent => "EXCELLENT",
        ScoreBadge::Great => "GREAT",
        ScoreBadge::Good => "GOOD",
        ScoreBadge::Fair => "FAIR",
        ScoreBadge::Mixed => "MIXED",
        ScoreBadge::Poor => "POOR",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    Idle,
    Loading,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    ApiBase,
    Year,
    Query,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub api_base: String,
    pub year: String,
    pub season: Season,
    pub query: String,
    pub sort_by_score: bool,
    pub status: RefreshStatus,
    pub error_message: Option<String>,
    pub records: Vec<HydratedRecord>,
    /// Bumped on every refresh; results from older generations are dropped.
    pub generation: u64,
    pub editing: Option<InputField>,
    pub selected: usize,
    pub export_dir: PathBuf,
    pub last_export: Option<String>,
    pub last_refreshed: Option<DateTime<Local>>,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::from_config(&AppConfig::default())
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            api_base: config.api_base.clone(),
            year: config.year.clone(),
            season: config.season,
            query: String::new(),
            sort_by_score: true,
            status: RefreshStatus::Idle,
            error_message: None,
            records: Vec::new(),
            generation: 0,
            editing: None,
            selected: 0,
            export_dir: config.export_dir.clone(),
            last_export: None,
            last_refreshed: None,
            logs: VecDeque::with_capacity(200),
            help_overlay: false,
        }
    }

    pub fn predictions_url(&self) -> String {
        predictions_url(&self.api_base, &self.year, self.season.as_str())
    }

    /// Moves to `Loading` and returns the command that performs the fetch.
    /// A refresh already in flight is not cancelled; its result is discarded
    /// on arrival because its generation is stale.
    pub fn begin_refresh(&mut self) -> ProviderCommand {
        self.generation += 1;
        self.status = RefreshStatus::Loading;
        self.error_message = None;
        ProviderCommand::Refresh {
            generation: self.generation,
            api_base: self.api_base.trim().to_string(),
            year: self.year.trim().to_string(),
            season: self.season,
        }
    }

    /// Snapshot of the current filtered and sorted rows for CSV export.
    pub fn export_command(&self) -> ProviderCommand {
        ProviderCommand::ExportCsv {
            dir: self.export_dir.clone(),
            year: self.year.trim().to_string(),
            season: self.season,
            rows: self.visible_records().into_iter().cloned().collect(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == RefreshStatus::Loading
    }

    pub fn visible_records(&self) -> Vec<&HydratedRecord> {
        derive_view(&self.records, &self.query, self.sort_by_score)
    }

    pub fn selected_record(&self) -> Option<&HydratedRecord> {
        self.visible_records().get(self.selected).copied()
    }

    pub fn toggle_sort(&mut self) {
        self.sort_by_score = !self.sort_by_score;
        self.selected = 0;
    }

    pub fn cycle_season(&mut self) {
        self.season = self.season.next();
    }

    pub fn select_next(&mut self) {
        let total = self.visible_records().len();
        if total == 0 {
            self.selected = 0;
            return;
        }
        self.selected = (self.selected + 1) % total;
    }

    pub fn select_prev(&mut self) {
        let total = self.visible_records().len();
        if total == 0 {
            self.selected = 0;
            return;
        }
        if self.selected == 0 {
            self.selected = total - 1;
        } else {
            self.selected -= 1;
        }
    }

    pub fn clamp_selection(&mut self) {
        let total = self.visible_records().len();
        if total == 0 {
            self.selected = 0;
        } else if self.selected >= total {
            self.selected = total - 1;
        }
    }

    pub fn start_editing(&mut self, field: InputField) {
        self.editing = Some(field);
    }

    pub fn stop_editing(&mut self) {
        self.editing = None;
    }

    pub fn input_push(&mut self, ch: char) {
        let Some(field) = self.editing else {
            return;
        };
        self.field_mut(field).push(ch);
        if field == InputField::Query {
            self.selected = 0;
        }
    }

    pub fn input_pop(&mut self) {
        let Some(field) = self.editing else {
            return;
        };
        self.field_mut(field).pop();
        if field == InputField::Query {
            self.selected = 0;
        }
    }

    pub fn field_value(&self, field: InputField) -> &str {
        match field {
            InputField::ApiBase => &self.api_base,
            InputField::Year => &self.year,
            InputField::Query => &self.query,
        }
    }

    fn field_mut(&mut self, field: InputField) -> &mut String {
        match field {
            InputField::ApiBase => &mut self.api_base,
            InputField::Year => &mut self.year,
            InputField::Query => &mut self.query,
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }
}

/// Filtered and optionally sorted view over `records`.
///
/// The query is trimmed and compared case-insensitively against the title,
/// and as a plain substring against the decimal id. Sorting is stable and
/// descending by score with a missing score counted as zero.
pub fn derive_view<'a>(
    records: &'a [HydratedRecord],
    query: &str,
    sort_by_score: bool,
) -> Vec<&'a HydratedRecord> {
    let query = query.trim().to_lowercase();
    let mut rows: Vec<&HydratedRecord> = if query.is_empty() {
        records.iter().collect()
    } else {
        records
            .iter()
            .filter(|record| matches_query(record, &query))
            .collect()
    };

    if sort_by_score {
        rows.sort_by(|a, b| b.score_or_zero().total_cmp(&a.score_or_zero()));
    }
    rows
}

fn matches_query(record: &HydratedRecord, query: &str) -> bool {
    let title_hit = record
        .title
        .as_deref()
        .is_some_and(|title| title.to_lowercase().contains(query));
    title_hit || record.id_label().contains(query)
}

#[derive(Debug, Clone)]
pub enum Delta {
    RefreshFinished {
        generation: u64,
        result: Result<Vec<HydratedRecord>, String>,
    },
    ExportFinished {
        path: String,
        rows: usize,
    },
    ExportFailed {
        path: String,
        error: String,
    },
    Log(String),
}

#[derive(Debug, Clone)]
pub enum ProviderCommand {
    Refresh {
        generation: u64,
        api_base: String,
        year: String,
        season: Season,
    },
    ExportCsv {
        dir: PathBuf,
        year: String,
        season: Season,
        rows: Vec<HydratedRecord>,
    },
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::RefreshFinished { generation, result } => {
            if generation != state.generation {
                state.push_log(format!(
                    "[INFO] Dropped stale refresh #{generation} (current #{})",
                    state.generation
                ));
                return;
            }
            match result {
                Ok(records) => {
                    let missing = records.iter().filter(|r| r.image_url.is_none()).count();
                    state.push_log(format!(
                        "[INFO] Loaded {} predictions ({} without cover)",
                        records.len(),
                        missing
                    ));
                    state.records = records;
                    state.status = RefreshStatus::Idle;
                    state.error_message = None;
                    state.last_refreshed = Some(Local::now());
                }
                Err(message) => {
                    state.push_log(format!("[ERROR] Refresh failed: {message}"));
                    state.records.clear();
                    state.status = RefreshStatus::Error;
                    state.error_message = Some(message);
                }
            }
            state.clamp_selection();
        }
        Delta::ExportFinished { path, rows } => {
            state.push_log(format!("[INFO] Exported {rows} rows to {path}"));
            state.last_export = Some(path);
        }
        Delta::ExportFailed { path, error } => {
            state.push_log(format!("[WARN] Export to {path} failed: {error}"));
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}

pub fn status_label(status: RefreshStatus) -> &'static str {
    match status {
        RefreshStatus::Idle => "IDLE",
        RefreshStatus::Loading => "LOADING",
        RefreshStatus::Error => "ERROR",
    }
}

pub fn sort_label(sort_by_score: bool) -> &'static str {
    if sort_by_score {
        "Sorted by score ↓"
    } else {
        "Original order"
    }
}

pub fn field_label(field: InputField) -> &'static str {
    match field {
        InputField::ApiBase => "API base",
        InputField::Year => "Year",
        InputField::Query => "Search",
    }
}
