//! This file is the root of the `chnative` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of our library (`column`, `types`,
//!     `proto`, etc.) so the Rust compiler knows they exist.
//! 2.  Re-exporting the handful of names most callers need: the column factory,
//!     the `Column` contract, host values, the block codec and the error type.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
pub mod block;
pub mod column;
pub mod config;
pub mod error;
pub mod kernels;
pub mod logging;
pub mod proto;
pub mod traits;
pub mod types;

//==================================================================================
// 2. Public API
//==================================================================================
pub use block::Block;
pub use column::{resolve, Column};
pub use config::{CodecConfig, ServerContext, ServerFeatures};
pub use error::CodecError;
pub use logging::init_logging;
pub use proto::{Buffer, Reader};
pub use types::{FromValue, JsonObject, RawBytes, TypeDesc, Value};
