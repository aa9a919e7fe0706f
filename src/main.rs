//! Command-line interface for avro-publish
//!
//! # Usage Examples
//!
//! ```bash
//! # Publish the fixed sensor reading to Kafka
//! avro-publish \
//!   --broker-uri kafka://localhost:9092 \
//!   --schema-path demos/sensor_data.avsc \
//!   --topic warning_sensor_data
//!
//! # Everything from a config file, one field overridden
//! avro-publish --config demos/publisher.toml --field readingValue=412.5
//!
//! # Dry run against the in-process broker with registry framing
//! avro-publish --config demos/publisher.toml \
//!   --broker-uri memory://local --schema-id 7
//! ```
//!
//! ## Exit Codes
//! - `0` published
//! - `2` configuration
//! - `10` schema could not be read or parsed
//! - `20` broker connection
//! - `30` producer creation
//! - `40` record does not match the schema
//! - `50` broker rejected or lost the message
//! - `70` internal error

use avro_publish::error::EXIT_OK;
use avro_publish::{run, Cli, PublishFailure, Settings};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let outcome = Settings::resolve(cli)
        .map_err(PublishFailure::from)
        .and_then(|settings| run::run(&settings));

    let code = match outcome {
        Ok(id) => {
            println!("{id}");
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Error: {e}");
            e.exit_code()
        }
    };
    std::process::exit(code);
}
