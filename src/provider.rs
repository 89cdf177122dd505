use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use crate::config::AppConfig;
use crate::cover_fetch;
use crate::export;
use crate::hydrate::{self, pending_lookups};
use crate::predictions_fetch;
use crate::state::{Delta, ProviderCommand, Season};

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub jikan_base: String,
    pub fetch_parallelism: Option<usize>,
}

impl From<&AppConfig> for ProviderConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            jikan_base: config.jikan_base.clone(),
            fetch_parallelism: config.fetch_parallelism,
        }
    }
}

pub fn spawn_provider(
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
    config: ProviderConfig,
) {
    thread::spawn(move || {
        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                ProviderCommand::Refresh {
                    generation,
                    api_base,
                    year,
                    season,
                } => {
                    // Each refresh runs on its own thread; an earlier one still in
                    // flight keeps going and is dropped by generation on arrival.
                    let tx = tx.clone();
                    let config = config.clone();
                    thread::spawn(move || {
                        run_refresh(&tx, &config, generation, &api_base, &year, season);
                    });
                }
                ProviderCommand::ExportCsv {
                    dir,
                    year,
                    season,
                    rows,
                } => match export::write_predictions_csv(&dir, &year, season, &rows) {
                    Ok(path) => {
                        let _ = tx.send(Delta::ExportFinished {
                            path: path.display().to_string(),
                            rows: rows.len(),
                        });
                    }
                    Err(err) => {
                        let path = dir.join(export::export_filename(&year, season));
                        let _ = tx.send(Delta::ExportFailed {
                            path: path.display().to_string(),
                            error: format!("{err:#}"),
                        });
                    }
                },
            }
        }
    });
}

fn run_refresh(
    tx: &Sender<Delta>,
    config: &ProviderConfig,
    generation: u64,
    api_base: &str,
    year: &str,
    season: Season,
) {
    let url = predictions_fetch::predictions_url(api_base, year, season.as_str());
    let _ = tx.send(Delta::Log(format!("[INFO] Refresh #{generation}: GET {url}")));

    let result = hydrate::refresh_predictions(
        || {
            let records = predictions_fetch::fetch_predictions(api_base, year, season.as_str())?;
            let pending = pending_lookups(&records);
            if pending > 0 {
                let _ = tx.send(Delta::Log(format!(
                    "[INFO] Resolving {pending} missing covers"
                )));
            }
            Ok(records)
        },
        config.fetch_parallelism,
        |mal_id| cover_fetch::resolve_cover(&config.jikan_base, mal_id),
    );

    let _ = tx.send(Delta::RefreshFinished {
        generation,
        result: result.map_err(|err| format!("{err:#}")),
    });
}
