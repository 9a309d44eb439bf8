pub mod attendance_commands;
pub mod ingest_commands;

pub use attendance_commands::*;
pub use ingest_commands::*;
