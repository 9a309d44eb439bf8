// Domain entities

pub mod attendance;
pub mod query;
pub mod registry;
pub mod runtime_config;

pub use attendance::*;
pub use query::*;
pub use registry::*;
pub use runtime_config::*;
