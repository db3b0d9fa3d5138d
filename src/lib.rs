//! Kovri - router startup configuration
//!
//! Everything the Kovri I2P router resolves before it starts its transports:
//! command-line and `kovri.conf` options, `tunnels.conf` tunnel definitions
//! and the process-wide logging pipeline.
//!
//! # Features
//!
//! - Command-line options merged over `kovri.conf` over built-in defaults
//! - Grouped usage text (`--help`, `--help-with <group>`)
//! - Typed client/server tunnel descriptors with access lists
//! - Severity filtering with console and daily-rotated file sinks
//!
//! # Example
//!
//! ```rust,no_run
//! use kovri::{ActiveLogConfig, LoggingContext, OptionResolver, Resolution};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = match OptionResolver::default().resolve_default(std::env::args())? {
//!         Resolution::Run(options) => options,
//!         Resolution::Exit(usage) => {
//!             println!("{usage}");
//!             return Ok(());
//!         }
//!     };
//!
//!     let _logging = LoggingContext::install(ActiveLogConfig::from_options(&options)?)?;
//!     let tunnels = kovri::tunnels::load(&options.tunnels_file()?)?;
//!     println!("{} tunnel(s) configured", tunnels.len());
//!
//!     Ok(())
//! }
//! ```

pub mod attribute;
pub mod destination;
pub mod error;
pub mod ini;
pub mod logging;
pub mod options;
pub mod paths;
pub mod schema;
pub mod tunnels;
pub mod usage;

pub use attribute::Key;
pub use error::{KovriError, KovriResult};
pub use logging::{ActiveLogConfig, LoggingContext, Severity, SeverityFilter, Sink};
pub use options::{OptionResolver, Resolution, ResolvedConfig, ValueSource};
pub use paths::DataDir;
pub use schema::{OptionGroup, OptionKind, OptionSpec, OptionValue, Schema};
pub use tunnels::{AccessControl, AclMode, TunnelDescriptor, TunnelKind};
