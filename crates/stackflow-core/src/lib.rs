pub mod config;
pub mod error;
pub mod event;
pub mod store;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{CapabilityError, CapabilityResult, Result, StackError};
pub use event::EventBus;
pub use types::*;
