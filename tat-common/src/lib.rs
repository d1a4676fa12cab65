//! # Tennis Attribution Trainer common library
//!
//! Shared code for the Tennis Attribution Trainer services:
//! - Analysis result schema (segments + summary) returned by the LLM
//! - Session, pattern and profile records
//! - Configuration file loading
//! - Retry with exponential backoff for external API calls
//! - Emotional Tennis Framework lookup table

pub mod analysis;
pub mod config;
pub mod emotions;
pub mod error;
pub mod retry;
pub mod session;

pub use error::{Error, Result};
pub use retry::{retry_with_backoff, RetryPolicy, Retryable};
