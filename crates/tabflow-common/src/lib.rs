//! tabflow common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, error handling and logging for the tabflow workspace.
//!
//! - **Types**: the canonical record model ([`types::RecordSet`]) every
//!   extractor produces and every sink consumes
//! - **Errors**: [`TabflowError`] and the [`ErrorKind`] categories used in
//!   failure reports
//! - **Logging**: tracing subscriber setup ([`logging`]) and the injected run
//!   progress log ([`progress`])
//!
//! # Example
//!
//! ```
//! use tabflow_common::types::{Record, RecordSet};
//!
//! # fn main() -> tabflow_common::Result<()> {
//! let mut banks = RecordSet::empty(["Name", "MC_USD_Billion"])?;
//! banks.append(Record::new().with("Name", "AlphaBank").with("MC_USD_Billion", 300.12))?;
//! assert_eq!(banks.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod logging;
pub mod progress;
pub mod types;

// Re-export commonly used types
pub use error::{ErrorKind, Result, TabflowError};
pub use progress::ProgressLog;
pub use types::{Record, RecordSet, Schema, Value};
