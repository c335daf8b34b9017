//! droverctl (drover) - operator CLI for the drover scheduler client.
//!
//! Answers uptime SLA questions about jobs and hosts, and drives batched
//! rolling restarts, against a scheduler reached over JSON HTTP.

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod parse;
