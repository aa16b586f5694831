//! Revenue Forecast Library
//!
//! Revenue KPIs and a 3-period revenue forecast per product, computed from
//! a tenant's recorded sales and stored through SeaORM.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod commands;
pub mod config;
pub mod db;
pub mod errors;
pub mod migrator;
pub mod ml;
pub mod models;
pub mod repositories;
pub mod services;

pub use errors::{AppError, ServiceError};
