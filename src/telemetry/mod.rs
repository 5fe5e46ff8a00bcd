pub mod aggregator;
pub mod evaluation_summary;
pub mod events;
pub mod logger_usage;
pub mod uploader;
