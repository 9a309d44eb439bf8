pub mod attendance_store;
pub mod registry_store;
pub mod sqlite_repo;

pub use sqlite_repo::*;
