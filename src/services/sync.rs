use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::RwLock;

use crate::{
    error::Result,
    models::{
        attendance::CURRENT_MONTH,
        sync::{CachedData, SyncMeta, SyncProgress, SyncReport, SyncSnapshot, SyncStatus},
    },
    repositories::{
        attendance as attendance_repo, profile as profile_repo, sync_meta as sync_meta_repo,
        timetable as timetable_repo,
    },
    services::{auth::validate_session, portal},
    state::AppState,
};

const TOTAL_STEPS: u32 = 3;
/// How long `success` stays visible before the tracker drops back to `idle`.
const SUCCESS_DISPLAY: Duration = Duration::from_secs(3);
const PROFILE_MAX_AGE_MS: i64 = 30 * 24 * 60 * 60 * 1000;

const AUTH_REQUIRED: &str = "Authentication required";
const SESSION_EXPIRED: &str = "Session expired. Please log in again.";

/// Shared view of the sync state machine.
#[derive(Clone, Default)]
pub struct SyncTracker {
    snapshot: Arc<RwLock<SyncSnapshot>>,
    /// Bumped on every transition so a delayed reset can tell it has been overtaken.
    generation: Arc<AtomicU64>,
}

impl SyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> SyncSnapshot {
        self.snapshot.read().await.clone()
    }

    async fn update(&self, apply: impl FnOnce(&mut SyncSnapshot)) -> u64 {
        let mut snapshot = self.snapshot.write().await;
        apply(&mut snapshot);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn begin(&self) {
        self.update(|s| {
            s.status = SyncStatus::Syncing;
            s.error = None;
            s.progress = Some(SyncProgress { current: 0, total: TOTAL_STEPS });
        })
        .await;
    }

    async fn advance(&self, current: u32) {
        self.update(|s| s.progress = Some(SyncProgress { current, total: TOTAL_STEPS }))
            .await;
    }

    async fn fail(&self, status: SyncStatus, error: &str) {
        self.update(|s| {
            s.status = status;
            s.error = Some(error.to_string());
            s.progress = None;
        })
        .await;
    }

    async fn succeed(&self, at: DateTime<Utc>) {
        let generation = self
            .update(|s| {
                s.status = SyncStatus::Success;
                s.error = None;
                s.last_synced = Some(at);
            })
            .await;

        let tracker = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SUCCESS_DISPLAY).await;
            let mut snapshot = tracker.snapshot.write().await;
            if tracker.generation.load(Ordering::SeqCst) == generation {
                snapshot.status = SyncStatus::Idle;
                snapshot.progress = None;
            }
        });
    }
}

/// Pulls fresh data from the portal into the cache.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - Session cookies to sync with. `None` ends in `auth_required` without touching the network.
///
/// # Returns
///
/// What happened. Errors are reported in the `SyncReport`, not returned.
pub async fn sync(state: &AppState, cookies: Option<&str>) -> SyncReport {
    let tracker = &state.sync;

    let Some(cookies) = cookies.filter(|c| !c.is_empty()) else {
        tracker.fail(SyncStatus::AuthRequired, AUTH_REQUIRED).await;
        return SyncReport::failed(SyncStatus::AuthRequired, AUTH_REQUIRED);
    };

    tracker.begin().await;
    tracing::info!("🔄 Sync started");

    if !validate_session(state.transport.as_ref(), cookies).await {
        tracing::warn!("Sync aborted, portal rejected the session");
        tracker.fail(SyncStatus::AuthRequired, SESSION_EXPIRED).await;
        return SyncReport::failed(SyncStatus::AuthRequired, SESSION_EXPIRED);
    }

    match run_sync(state, cookies).await {
        Ok(report) => {
            tracker.succeed(Utc::now()).await;
            tracing::info!(
                "✅ Sync completed: {} attendance rows, {} timetable slots, profile refreshed: {}",
                report.attendance_count,
                report.timetable_count,
                report.profile_refreshed
            );
            report
        }
        Err(e) => {
            let message = e.to_string();
            tracing::error!("❌ Sync failed: {}", message);
            tracker.fail(SyncStatus::Error, &message).await;
            SyncReport::failed(SyncStatus::Error, message)
        }
    }
}

async fn run_sync(state: &AppState, cookies: &str) -> Result<SyncReport> {
    let store = state.store.as_ref();
    let transport = state.transport.as_ref();
    let now = Utc::now().timestamp_millis();

    let meta = sync_meta_repo::get_sync_meta(store).await?;
    let cached_profile = profile_repo::get_cached_profile(store).await?;
    let mut profile_last_fetched = meta.as_ref().and_then(|m| m.profile_last_fetched);
    let mut profile_refreshed = false;

    if profile_is_stale(cached_profile.is_some(), meta.as_ref(), now) {
        tracing::debug!("Refreshing student profile");
        if let Some(profile) = portal::fetch_student_profile(transport, cookies).await? {
            profile_repo::set_cached_profile(store, &profile).await?;
            profile_last_fetched = Some(now);
            profile_refreshed = true;
        }
    }

    state.sync.advance(1).await;
    let (attendance, timetable) = tokio::join!(
        portal::fetch_attendance(transport, cookies),
        portal::fetch_timetable(transport, cookies)
    );
    let attendance = attendance?;
    let timetable = timetable?;

    state.sync.advance(2).await;
    if !attendance.is_empty() {
        attendance_repo::upsert_attendance(store, CURRENT_MONTH, &attendance).await?;
    }
    if !timetable.is_empty() {
        timetable_repo::replace_timetable(store, &timetable).await?;
    }

    state.sync.advance(3).await;
    let months_fetched = if attendance.is_empty() {
        Vec::new()
    } else {
        vec![CURRENT_MONTH.to_string()]
    };
    sync_meta_repo::set_sync_meta(
        store,
        &SyncMeta {
            timestamp: now,
            months_fetched,
            profile_last_fetched,
        },
    )
    .await?;

    Ok(SyncReport {
        status: SyncStatus::Success,
        error: None,
        profile_refreshed,
        attendance_count: attendance.len(),
        timetable_count: timetable.len(),
    })
}

/// The profile rarely changes; it is refetched when missing or a month old.
fn profile_is_stale(has_profile: bool, meta: Option<&SyncMeta>, now_ms: i64) -> bool {
    !has_profile || meta.is_none_or(|m| now_ms - m.timestamp > PROFILE_MAX_AGE_MS)
}

/// Everything cached, for display.
pub async fn load_snapshot(state: &AppState) -> Result<CachedData> {
    let store = state.store.as_ref();
    Ok(CachedData {
        profile: profile_repo::get_cached_profile(store).await?,
        attendance: attendance_repo::get_cached_attendance(store).await?,
        timetable: timetable_repo::get_cached_timetable(store).await?,
        sync_meta: sync_meta_repo::get_sync_meta(store).await?,
    })
}

/// Status snapshot, with `last_synced` filled from the cache when this process has not synced yet.
pub async fn status(state: &AppState) -> Result<SyncSnapshot> {
    let mut snapshot = state.sync.snapshot().await;
    if snapshot.last_synced.is_none() {
        snapshot.last_synced = sync_meta_repo::get_last_sync_time(state.store.as_ref())
            .await?
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        gateway::proxy::tests::ScriptedTransport,
        models::profile::StudentProfile,
        portal::endpoints,
        store::{Cache, MemoryStore},
    };

    const PROBE: &str = r#"{"Data":{"ApplicantRegistrationDetails":{"RegistrationNumber":"SH21CS042","Name":"Anna Joseph","SemesterId":5}}}"#;
    const ATTENDANCE: &str = r#"<table id="tblsubjectwiseattendence"><tbody>
<tr class="trboder"><td>Sl</td><td>Subject</td><td>T</td><td>C</td><td>P</td><td>A</td><td>CC</td><td>%</td></tr>
<tr><td>1</td><td>Physics</td><td>Theory</td><td>30</td><td>27</td><td>3</td><td>0</td><td>90%</td></tr>
<tr><td>2</td><td>Chemistry</td><td>Theory</td><td>20</td><td>15</td><td>5</td><td>0</td><td>75%</td></tr>
</tbody></table>"#;
    const TIMETABLE: &str = r#"{"TimeTableChildsList":[
{"TimeTableDayMasterId":6,"TimeTableHourMasterId":1,"SubjectName":"Physics - PHY"},
{"TimeTableDayMasterId":1,"TimeTableHourMasterId":2,"SubjectName":"Chemistry - CHE"}]}"#;

    fn portal() -> ScriptedTransport {
        ScriptedTransport::new()
            .respond(endpoints::CURRENT_SEM, 200, PROBE)
            .respond(endpoints::ATTENDANCE_DATA, 200, ATTENDANCE)
            .respond(endpoints::TIMETABLE, 200, TIMETABLE)
    }

    fn state_with(transport: Arc<ScriptedTransport>) -> AppState {
        let store: Cache = Arc::new(MemoryStore::new());
        AppState::from_parts(Config::for_portal("https://portal.invalid"), store, transport).unwrap()
    }

    #[tokio::test]
    async fn test_sync_without_cookies_needs_auth_and_makes_no_calls() {
        let transport = Arc::new(portal());
        let state = state_with(transport.clone());

        let report = sync(&state, None).await;
        assert_eq!(report.status, SyncStatus::AuthRequired);
        assert_eq!(report.error.as_deref(), Some(AUTH_REQUIRED));
        assert!(transport.calls().is_empty());

        let snapshot = state.sync.snapshot().await;
        assert_eq!(snapshot.status, SyncStatus::AuthRequired);
    }

    #[tokio::test]
    async fn test_sync_with_expired_session() {
        let state = state_with(Arc::new(portal().respond(endpoints::CURRENT_SEM, 200, r#"{"Data":0}"#)));

        let report = sync(&state, Some("a=1")).await;
        assert_eq!(report.status, SyncStatus::AuthRequired);
        assert_eq!(report.error.as_deref(), Some(SESSION_EXPIRED));
        assert!(load_snapshot(&state).await.unwrap().sync_meta.is_none());
    }

    #[tokio::test]
    async fn test_full_sync_fills_cache() {
        let transport = Arc::new(portal());
        let state = state_with(transport.clone());

        let report = sync(&state, Some("a=1")).await;
        assert_eq!(report.status, SyncStatus::Success, "{:?}", report.error);
        assert!(report.profile_refreshed);
        assert_eq!(report.attendance_count, 2);
        assert_eq!(report.timetable_count, 2);

        let data = load_snapshot(&state).await.unwrap();
        assert_eq!(data.profile.unwrap().registration_number, "SH21CS042");
        assert_eq!(data.attendance[CURRENT_MONTH].len(), 2);
        assert_eq!(data.timetable[0].day, "Monday");
        let meta = data.sync_meta.unwrap();
        assert_eq!(meta.months_fetched, vec![CURRENT_MONTH.to_string()]);
        assert_eq!(meta.profile_last_fetched, Some(meta.timestamp));

        let snapshot = state.sync.snapshot().await;
        assert_eq!(snapshot.status, SyncStatus::Success);
        assert_eq!(snapshot.progress, Some(SyncProgress { current: 3, total: 3 }));
        assert!(snapshot.last_synced.is_some());

        let attendance_call = transport
            .calls()
            .into_iter()
            .find(|c| c.target_path == endpoints::ATTENDANCE_DATA)
            .unwrap();
        assert_eq!(attendance_call.cookies.as_deref(), Some("a=1"));
        assert_eq!(attendance_call.form_data.unwrap()["month"], "0");
    }

    #[tokio::test]
    async fn test_fresh_profile_is_not_refetched() {
        let transport = Arc::new(portal());
        let state = state_with(transport.clone());

        assert_eq!(sync(&state, Some("a=1")).await.status, SyncStatus::Success);
        let report = sync(&state, Some("a=1")).await;
        assert!(!report.profile_refreshed);
        // Two probes plus the first sync's profile fetch.
        assert_eq!(transport.calls_to(endpoints::CURRENT_SEM), 3);

        let meta = sync_meta_repo::get_sync_meta(state.store.as_ref()).await.unwrap().unwrap();
        assert!(meta.profile_last_fetched.is_some());
    }

    #[test]
    fn test_profile_staleness() {
        let meta = SyncMeta {
            timestamp: 1_000,
            months_fetched: vec![],
            profile_last_fetched: None,
        };
        assert!(profile_is_stale(false, Some(&meta), 2_000));
        assert!(profile_is_stale(true, None, 2_000));
        assert!(!profile_is_stale(true, Some(&meta), 1_000 + PROFILE_MAX_AGE_MS));
        assert!(profile_is_stale(true, Some(&meta), 1_001 + PROFILE_MAX_AGE_MS));
    }

    #[tokio::test]
    async fn test_transport_error_reports_error_and_keeps_cache() {
        let state = state_with(Arc::new(portal().fail(endpoints::TIMETABLE)));
        profile_repo::set_cached_profile(state.store.as_ref(), &StudentProfile::default())
            .await
            .unwrap();

        let report = sync(&state, Some("a=1")).await;
        assert_eq!(report.status, SyncStatus::Error);
        assert!(report.error.unwrap().contains("connection refused"));

        let data = load_snapshot(&state).await.unwrap();
        assert!(data.profile.is_some());
        assert!(data.sync_meta.is_none());
        assert_eq!(state.sync.snapshot().await.status, SyncStatus::Error);
    }

    #[tokio::test]
    async fn test_empty_results_do_not_wipe_cache() {
        let state = state_with(Arc::new(portal()));
        assert_eq!(sync(&state, Some("a=1")).await.status, SyncStatus::Success);

        let failing = Arc::new(
            portal()
                .respond(endpoints::ATTENDANCE_DATA, 500, "")
                .respond(endpoints::TIMETABLE, 200, "<html>maintenance</html>"),
        );
        let state = AppState { transport: failing, ..state };
        let report = sync(&state, Some("a=1")).await;
        assert_eq!(report.status, SyncStatus::Success);
        assert_eq!(report.attendance_count, 0);

        let data = load_snapshot(&state).await.unwrap();
        assert_eq!(data.attendance[CURRENT_MONTH].len(), 2);
        assert_eq!(data.timetable.len(), 2);
        assert!(data.sync_meta.unwrap().months_fetched.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_subject_leaves_the_cache() {
        let state = state_with(Arc::new(portal()));
        assert_eq!(sync(&state, Some("a=1")).await.status, SyncStatus::Success);

        let physics_only = ATTENDANCE.replace(
            "<tr><td>2</td><td>Chemistry</td><td>Theory</td><td>20</td><td>15</td><td>5</td><td>0</td><td>75%</td></tr>",
            "",
        );
        let transport = Arc::new(portal().respond(endpoints::ATTENDANCE_DATA, 200, &physics_only));
        let state = AppState { transport, ..state };
        assert_eq!(sync(&state, Some("a=1")).await.status, SyncStatus::Success);

        let data = load_snapshot(&state).await.unwrap();
        let subjects: Vec<&str> = data.attendance[CURRENT_MONTH]
            .iter()
            .map(|r| r.subject.as_str())
            .collect();
        assert_eq!(subjects, vec!["Physics"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_returns_to_idle() {
        let tracker = SyncTracker::new();
        tracker.begin().await;
        tracker.succeed(Utc::now()).await;
        assert_eq!(tracker.snapshot().await.status, SyncStatus::Success);

        tokio::time::sleep(SUCCESS_DISPLAY + Duration::from_millis(10)).await;
        assert_eq!(tracker.snapshot().await.status, SyncStatus::Idle);

        tracker.succeed(Utc::now()).await;
        tracker.begin().await;
        tokio::time::sleep(SUCCESS_DISPLAY + Duration::from_millis(10)).await;
        assert_eq!(tracker.snapshot().await.status, SyncStatus::Syncing);
    }
}
