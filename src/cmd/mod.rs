//! CLI command implementations.
//!
//! | Module  | Responsibility                                        |
//! |---------|-------------------------------------------------------|
//! | `serve` | Load config, set up logging, pick an engine, serve    |

pub mod serve;

pub use serve::cmd_serve;
