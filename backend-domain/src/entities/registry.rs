// Read-only views of registry-owned data

use serde::{Deserialize, Serialize};

use crate::value_objects::{ClassId, DeviceId, SchoolId, StudentId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub school_id: SchoolId,
    pub name: String,
    pub is_online: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentSummary {
    pub id: StudentId,
    pub school_id: SchoolId,
    pub full_name: String,
    pub admission_number: Option<String>,
    pub class_id: Option<ClassId>,
    pub class_name: Option<String>,
}
