pub mod config;
pub mod cover_fetch;
pub mod export;
pub mod http_client;
pub mod hydrate;
pub mod predictions_fetch;
pub mod provider;
pub mod state;
