#![deny(clippy::unwrap_used)]

pub mod archive;
pub mod config;
pub mod report;
pub mod upload;
