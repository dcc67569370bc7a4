use serde::Deserialize;
use sonic_rs::JsonValueTrait;

use crate::{
    error::{AppError, Result},
    models::profile::StudentProfile,
};

#[derive(Debug, Deserialize)]
struct CurrentSemEnvelope {
    #[serde(rename = "Data")]
    data: Option<CurrentSemData>,
}

#[derive(Debug, Deserialize)]
struct CurrentSemData {
    #[serde(rename = "ApplicantRegistrationDetails")]
    details: Option<RegistrationDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RegistrationDetails {
    registration_number: Option<String>,
    name: Option<String>,
    course: Option<String>,
    class: Option<String>,
    batch: Option<String>,
    semester_id: Option<Scalar>,
    academic_year_id: Option<Scalar>,
    program_type_master_id: Option<i64>,
}

/// Ids the portal sends as numbers or as strings depending on the record.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s,
        }
    }
}

fn decode_profile(body: &str) -> Result<Option<StudentProfile>> {
    let envelope: CurrentSemEnvelope = sonic_rs::from_str(body)
        .map_err(|e| AppError::Parse(format!("current-semester envelope: {}", e)))?;

    let Some(details) = envelope.data.and_then(|d| d.details) else {
        return Ok(None);
    };

    Ok(Some(StudentProfile {
        registration_number: details.registration_number.unwrap_or_default(),
        name: details.name.unwrap_or_default(),
        course: details.course.unwrap_or_default(),
        class_name: details.class.unwrap_or_default(),
        batch: details.batch.unwrap_or_default(),
        semester: details.semester_id.map(Scalar::into_text).unwrap_or_default(),
        academic_year: details.academic_year_id.map(Scalar::into_text).unwrap_or_default(),
        program_type_id: details.program_type_master_id,
        ..StudentProfile::default()
    }))
}

/// Projects the current-semester payload into a profile. Never fails; bad payloads give `None`.
pub fn parse_profile(body: &str) -> Option<StudentProfile> {
    match decode_profile(body) {
        Ok(profile) => {
            if profile.is_none() {
                tracing::warn!("Current-semester payload carries no registration details");
            }
            profile
        }
        Err(e) => {
            tracing::warn!("Discarding profile payload: {}", e);
            None
        }
    }
}

/// Whether a current-semester response proves the session is still accepted.
///
/// Expired sessions get either a login page or a JSON body whose `Data` is null or `0`.
pub fn session_probe_is_valid(status: u16, body: &str) -> bool {
    if status != 200 {
        return false;
    }
    let Ok(json) = sonic_rs::from_str::<sonic_rs::Value>(body) else {
        return false;
    };
    if !json.is_object() {
        return false;
    }
    match json.get("Data") {
        None => false,
        Some(data) if data.is_null() => false,
        Some(data) => !(data.is_number() && data.as_f64() == Some(0.0)),
    }
}
