//! Router assembly and shared state for the hub daemon.

pub mod http;

mod state;

pub use state::AppState;
