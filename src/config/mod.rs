mod settings;

pub use settings::{HistoryConfig, LoggingConfig, Settings};
