pub mod config;
pub mod error;
pub mod fetcher;
pub mod highscore_parser;
pub mod monitor;
pub mod store;
pub mod types;
pub mod utils;

pub use config::MonitorConfig;
pub use error::MonitorError;
pub use fetcher::{HttpFetcher, PageSource};
pub use highscore_parser::{HighscoreParser, LayoutContract};
pub use monitor::{compute_wait, Monitor};
pub use store::{SnapshotStore, SqliteStore};
pub use types::{CycleReport, PlayerEntity, PlayerRecord, SnapshotRow};
