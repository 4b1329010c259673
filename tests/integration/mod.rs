//! Integration tests for the Rust backend.
//!
//! These tests require external services (Redis, Firestore, R2) to be available.
//! Run with: `cargo test --test integration -- --ignored`

pub mod api_tests;
pub mod firestore_tests;
pub mod redis_tests;
pub mod storage_tests;
