pub mod api;
pub mod config;
pub mod discover;
pub mod report;
pub mod sync;
