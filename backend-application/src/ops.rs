pub mod attendance_stream_hub;
pub mod device_locks;

pub use attendance_stream_hub::AttendanceStreamHub;
pub use device_locks::DeviceLocks;
