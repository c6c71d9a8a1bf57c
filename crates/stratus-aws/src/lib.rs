//! AWS backend for Stratus
//!
//! Implements the `BackendAdapter` trait with the official AWS SDK.
//!
//! # Supported sub-resources
//!
//! - VPCs, subnets, internet gateways and their attachments
//! - EC2 instances (polled until `running`)
//! - S3 buckets and bucket versioning
//! - SQS queues, Secrets Manager secrets and ECR repositories
//! - Route53 record sets
//!
//! Credentials and region come from the SDK's default provider chain;
//! `AWS_REGION` overrides the region.

pub mod adapter;
pub mod error;
pub mod requests;

pub use adapter::{AwsAdapter, AwsSettings, capability};
pub use error::{AwsError, Result};
