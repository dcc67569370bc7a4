use crate::{
    error::Result,
    gateway::proxy::Transport,
    models::{
        attendance::AttendanceRecord, profile::StudentProfile, proxy::ProxyRequest,
        timetable::TimetableEntry,
    },
    portal::{attendance::parse_attendance_html, endpoints, profile::parse_profile, timetable::parse_timetable},
};

/// Fetches the student's registration details.
///
/// A non-200 answer yields `None`; transport failures are returned.
pub async fn fetch_student_profile(
    transport: &dyn Transport,
    cookies: &str,
) -> Result<Option<StudentProfile>> {
    let response = transport
        .call(ProxyRequest::get(endpoints::CURRENT_SEM).with_cookies(cookies))
        .await?;

    if response.status != 200 {
        tracing::warn!("Profile fetch returned status {}", response.status);
        return Ok(None);
    }
    Ok(parse_profile(&response.body))
}

/// Fetches the running month's subject-wise attendance.
pub async fn fetch_attendance(
    transport: &dyn Transport,
    cookies: &str,
) -> Result<Vec<AttendanceRecord>> {
    let request = ProxyRequest::post(endpoints::ATTENDANCE_DATA, [("studentId", "0"), ("month", "0")])
        .with_cookies(cookies);
    let response = transport.call(request).await?;

    if response.status != 200 {
        tracing::warn!("Attendance fetch returned status {}", response.status);
        return Ok(Vec::new());
    }
    if response.body.is_empty() {
        tracing::warn!("Attendance response is empty");
        return Ok(Vec::new());
    }
    tracing::debug!("Attendance response received, {} bytes", response.body.len());
    Ok(parse_attendance_html(&response.body))
}

/// Fetches the current semester's weekly timetable.
pub async fn fetch_timetable(transport: &dyn Transport, cookies: &str) -> Result<Vec<TimetableEntry>> {
    // Empty ids select the current academic year and semester.
    let request = ProxyRequest::post(
        endpoints::TIMETABLE,
        [("model[AcademicYearId]", ""), ("model[SemesterId]", "")],
    )
    .with_cookies(cookies);
    let response = transport.call(request).await?;

    if response.status != 200 {
        tracing::warn!("Timetable fetch returned status {}", response.status);
        return Ok(Vec::new());
    }
    Ok(parse_timetable(&response.body))
}
