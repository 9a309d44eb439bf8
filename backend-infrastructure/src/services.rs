pub mod device_gateway;
pub mod health_service;
pub mod poll_scheduler;

pub use device_gateway::*;
pub use health_service::*;
pub use poll_scheduler::*;
