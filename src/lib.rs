//! Script runner: executes a script through an interpreter engine with its
//! standard streams bridged to a console window.

pub mod config;
pub mod console;
pub mod engine;
pub mod executor;
pub mod host;
pub mod journal;
pub mod logging;
pub mod runner;
pub mod stream;
pub mod tui;
pub mod utils;
