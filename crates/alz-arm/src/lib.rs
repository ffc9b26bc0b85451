//! ALZ ARM - Azure Resource Manager policy client
//!
//! Implements [`alz_core::PolicyClient`] over the ARM REST API so the
//! built-in resolver can fetch provider-owned policy definitions and policy
//! set definitions.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use alz_arm::{ArmClientConfig, ArmPolicyClient};
//!
//! let config = ArmClientConfig::default().with_bearer_token(token);
//! let client = ArmPolicyClient::new(config)?;
//! let alz = alz_core::AlzLib::new(options)?.with_policy_client(Arc::new(client));
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod config;
mod error;

pub use client::ArmPolicyClient;
pub use config::ArmClientConfig;
pub use error::{ArmError, ArmResult};
