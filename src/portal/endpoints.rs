//! Fixed paths on the student portal.

pub const LOGIN_PAGE: &str = "/studentlogin";
pub const LOGIN_POST: &str = "/StudentLogin/Create";
pub const LOGOUT: &str = "/StudentLogin/Logout";

/// Returns the current semester envelope; doubles as the profile and session probe.
pub const CURRENT_SEM: &str = "/Student/Home/StudentCurrentSem";
pub const TIMETABLE: &str = "/Student/Home/GetAllTimeTable";
pub const ATTENDANCE_DATA: &str = "/Student/StudentAttendanceProfile/SubjectWiseAttendence";
