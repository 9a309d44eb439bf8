pub mod attendance_queries;

pub use attendance_queries::*;
