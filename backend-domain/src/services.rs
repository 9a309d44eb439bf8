pub mod entry_exit;
pub mod student_matcher;

pub use entry_exit::*;
pub use student_matcher::*;
