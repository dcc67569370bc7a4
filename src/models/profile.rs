use serde::{Deserialize, Serialize};

/// The student's registration details as shown by the portal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub registration_number: String,
    pub name: String,
    pub course: String,
    pub class_name: String,
    pub batch: String,
    pub semester: String,
    pub academic_year: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fathers_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mothers_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_type_id: Option<i64>,
}
