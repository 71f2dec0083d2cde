//! Shared support for the `hockey-sync` and `scrape` binaries: environment
//! configuration, the `reqwest`-backed transport, and the HTTP trigger
//! surface. The actual scraping/classification/store logic lives in the
//! `hockey-sync-scraper` crate.

pub mod config;
pub mod server;
pub mod transport;
