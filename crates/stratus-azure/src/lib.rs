//! Azure backend for Stratus
//!
//! This crate implements the `BackendAdapter` trait on top of the az CLI.
//!
//! # Supported sub-resources
//!
//! - Resource groups, virtual networks, subnets, public IPs and NICs
//! - Virtual machines (polled)
//! - Storage accounts, blob containers and storage queues
//! - AKS clusters (polled) and container groups (polled)
//! - Container registries, load balancers, DNS zones and record sets
//!
//! # Requirements
//!
//! - `az` must be installed and logged in (`az login`)
//! - `AZURE_SUBSCRIPTION_ID` selects the subscription, `AZURE_LOCATION` the
//!   default location
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stratus_azure::AzureAdapter;
//! use stratus_engine::{Backend, Dispatcher};
//!
//! let dispatcher = Dispatcher::builder()
//!     .register(Backend::Azure, Arc::new(AzureAdapter::from_env()))
//!     .build();
//! ```

pub mod adapter;
pub mod az;
pub mod commands;
pub mod error;

pub use adapter::{AzureAdapter, AzureSettings, capability};
pub use error::{AzureError, Result};
