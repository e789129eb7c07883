pub mod binds;
pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod reaper;
pub mod server;
