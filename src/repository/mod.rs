// src/repository/mod.rs

//! Remote Supermarket sites
//!
//! This module provides:
//! - The [`SiteClient`] trait the mirror talks to
//! - An HTTP implementation with retries and streaming downloads
//! - URL builders for the Supermarket API

mod client;
pub mod endpoints;

pub use client::{HttpSiteClient, SiteClient, UploadResponse};
