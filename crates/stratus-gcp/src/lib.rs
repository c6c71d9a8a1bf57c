//! Google Cloud backend for Stratus
//!
//! Implements the `BackendAdapter` trait against the Google Cloud REST APIs
//! using an OAuth access token (`gcloud auth print-access-token`).
//!
//! # Supported sub-resources
//!
//! - Cloud Storage buckets
//! - VPC networks, subnetworks, static addresses and instances (polled)
//! - Cloud DNS managed zones and record sets
//! - Secret Manager secrets
//!
//! # Example
//!
//! ```ignore
//! use stratus_gcp::GcpAdapter;
//!
//! let adapter = GcpAdapter::from_env()?;
//! println!("project: {}", adapter.project());
//! ```

pub mod adapter;
pub mod api;
pub mod error;
pub mod requests;

pub use adapter::{GcpAdapter, GcpSettings, capability};
pub use error::{GcpError, Result};
