// src/lib.rs

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod specs;

pub mod chart;
pub mod data;
pub mod file;
pub mod notify;
pub mod progress;
pub mod runner;
pub mod source;
pub mod store;
pub mod window;
