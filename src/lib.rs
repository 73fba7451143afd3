//! timetrack - time tracking and timesheets for project work
//!
//! This library provides timers, manual time entries and per-project
//! timesheet aggregation behind a JSON API.

pub mod api;
pub mod config;
pub mod db;
pub mod hooks;
pub mod models;
pub mod services;
