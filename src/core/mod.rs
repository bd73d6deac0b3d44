// Public modules
pub mod command;
pub mod defaults;
pub mod error;
pub mod paths;
pub mod platform;
pub mod release;
pub mod rewrite;
pub mod transport;

// Re-export common types for convenience
pub use command::{CommandLine, CommandSet, Invocation, ShellDialect};
pub use error::{Error, ErrorCode, Result};
pub use platform::OsFamily;
