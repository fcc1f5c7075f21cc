//! immocrm - a multi-tenant CRM for real-estate agencies
//!
//! This library provides the core functionality for immocrm, including:
//! - Tenant-scoped data access over a pluggable backend (SQLite by default)
//! - Data models for contacts, deals, activities, templates and organizations
//! - The pipeline stage engine: board derivation, optimistic moves and rollback
//! - Repository layer for data access
//! - CLI command parsing and execution
//! - Filter expression parsing and evaluation
//!
//! # Example
//!
//! ```no_run
//! use immocrm::cli::run;
//!
//! fn main() {
//!     if let Err(e) = run() {
//!         eprintln!("Error: {}", e);
//!         std::process::exit(1);
//!     }
//! }
//! ```

pub mod accessor;
pub mod backend;
pub mod cache;
pub mod cli;
pub mod compose;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod filter;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod repo;
pub mod utils;
