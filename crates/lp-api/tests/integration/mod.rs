//! Integration test modules.

pub mod common;

mod backup_tests;
mod catalog_tests;
mod error_tests;
mod health_tests;
mod request_tests;
mod sample_tests;
