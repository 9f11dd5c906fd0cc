//! Docker project manager.
//!
//! Drives `docker`, `git` and `aws` to run per-project development containers
//! and to push images to ECR, using project settings from `.moby.yaml`.

pub mod cli;
pub mod config;
pub mod deploy;
pub mod dev;
pub mod env;
pub mod error;
pub mod git;
pub mod shell;

pub use error::{MobyError, Result};
