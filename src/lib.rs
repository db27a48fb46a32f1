pub mod api;
pub mod config;
pub mod extractor;
pub mod humanize;
pub mod jobs;
pub mod observability;
pub mod progress;
pub mod storage;
pub mod video_id;
pub mod worker;
