use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

use crate::config::http_timeout_secs_from_env;

const USER_AGENT: &str = concat!("mal-predictions-terminal/", env!("CARGO_PKG_VERSION"));

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(http_timeout_secs_from_env()))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build http client")
    })
}
