//! Photo memory clustering and daily narrated video generation.
//!
//! Photos are grouped by where and when they were taken, and each day a
//! handful of those groups are turned into short narrated slideshow videos
//! for a patient.

pub mod catalog;
pub mod clock;
pub mod clustering;
pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod geocode;
pub mod logging;
pub mod media;
pub mod model;
pub mod narration;
pub mod pipeline;
pub mod scanner;
pub mod scheduler;
pub mod services;
pub mod speech;
pub mod storage;
