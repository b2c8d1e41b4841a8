#![forbid(unsafe_code)]

pub mod browser;
pub mod cli;
pub mod commands;
pub mod dom;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod ledger;
pub mod logging;
pub mod metadata;
pub mod navigation;
pub mod page_capture;
pub mod pacing;
pub mod pdf;
pub mod prompt;
pub mod runner;
pub mod sanitize;
pub mod sort_key;
pub mod wait;
