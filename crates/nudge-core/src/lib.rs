pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::NudgeConfig;
pub use error::{NudgeError, Result};
pub use events::DomainEvent;
pub use types::*;
