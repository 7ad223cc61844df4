pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod jobs;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod models;
pub mod pagination;
pub mod services;
