// ABOUTME: Root library module exposing the application modules
// ABOUTME: Provides config loading, the console transport, and session wiring

pub mod app;
pub mod config;
pub mod console;

pub use app::{build_session, Backends};
pub use config::{Config, ConfigError};
pub use console::ConsoleTransport;
