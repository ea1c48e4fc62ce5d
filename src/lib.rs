//! Study planner: day plans of focused sessions, a single-flight session
//! timer, and weekly rollups with risk alerts. The terminal UI in `main.rs`
//! is one front end over this library.

pub mod app;
pub mod config;
pub mod event;
pub mod plan;
pub mod store;
pub mod ui;
