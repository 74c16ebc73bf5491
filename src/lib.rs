pub mod analyzer;
pub mod config;
pub mod data_models;
pub mod dialogue;
pub mod formatter;
pub mod logging;
pub mod search;
pub mod smalltalk;
pub mod telegram;
pub mod transport;
