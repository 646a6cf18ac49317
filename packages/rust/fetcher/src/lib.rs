//! Network access for the scan pipeline.
//!
//! This crate provides:
//! - [`HttpFetcher`]: deadline-bounded GET client with retry on transient failures
//! - [`StageResolver`]: maps a feed entry to the attachments of its project

pub mod client;
pub mod stages;

pub use client::{ACCEPT_ANY, ACCEPT_JSON, ACCEPT_XML, FetchOptions, HttpFetcher};
pub use stages::{StageResolver, collect_uuids, project_id};
