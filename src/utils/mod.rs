//! Generic utility primitives with zero domain knowledge.
//!
//! - `shell` - Shell escaping and quoting (POSIX, Windows, PowerShell)
//! - `validation` - Input validation helpers

pub mod shell;
pub mod validation;
