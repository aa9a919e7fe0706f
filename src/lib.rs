//! avro-publish: load an Avro schema, validate one record against it and
//! publish it to a broker.
//!
//! The binary is a thin wrapper around [`run::run`]. Integration tests drive
//! [`run::publish_once`] with an in-process broker instead.

pub mod config;
pub mod error;
pub mod run;
pub mod sample;

pub use config::{Cli, ConfigError, Settings};
pub use error::PublishFailure;
