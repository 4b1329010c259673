//! AssetStore: content-addressed object storage against an S3-compatible
//! (R2) bucket.
//!
//! This crate provides:
//! - Byte/file upload to the bucket
//! - Presigned GET/PUT URL generation
//! - Download, existence check, deletion

pub mod client;
pub mod error;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
