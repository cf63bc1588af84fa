//! WebCAF: organisations self-assess their systems against the NCSC Cyber
//! Assessment Framework and external assessors review the submissions.

pub mod assessment;
pub mod config;
pub mod configuration;
pub mod core;
pub mod directory;
pub mod framework;
pub mod references;
pub mod review;
pub mod security;
pub mod web_server;

pub use crate::core::shared::state::AppState;
