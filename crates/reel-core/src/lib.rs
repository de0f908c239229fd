pub mod actions;
pub mod cache;
pub mod commands;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod reducer;
pub mod stage;
pub mod state;
pub mod view;

pub use actions::*;
pub use reducer::*;
pub use state::*;

pub use cache::QueryKey;
pub use cache::QueryPayload;
pub use commands::Command;
pub use commands::CommandOutcome;
pub use config::Config;
