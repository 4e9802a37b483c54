//! Configuration for window-sizer
//!
//! - **record**: one saved window geometry, decoded from raw JSON
//! - **store**: the durable record collection (`window_configs.json`)
//! - **settings**: application settings behind a key/value store

pub mod record;
pub mod settings;
pub mod store;

pub use record::ConfigRecord;
pub use settings::{AppSettings, CloseBehavior, JsonSettingsStore, SettingsStore};
pub use store::{ConfigStore, ImportSummary, SharedStore};
