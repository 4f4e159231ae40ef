// ABOUTME: Root module for dine - a ring-contention simulator with back-off and fairness control.
// ABOUTME: Re-exports all public types from submodules.

pub mod agent;
pub mod config;
pub mod error;
pub mod monitor;
pub mod prelude;
pub mod report;
pub mod resource;
pub mod table;

pub use error::DineError;
