pub mod config;
pub mod context;
pub mod error;
pub mod traits;
pub mod types;

pub use config::EngineConfig;
pub use context::DiscoveryContext;
pub use error::{DiscoveryError, Result, ServiceFault};
pub use traits::*;
pub use types::*;
