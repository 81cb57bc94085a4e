pub mod api;
pub mod app;
pub mod audio;
pub mod call;
pub mod chat;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod global;
pub mod transcription;
pub mod ui;
