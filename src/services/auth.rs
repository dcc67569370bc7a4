use chrono::Utc;
use zeroize::Zeroize;

use crate::{
    crypto::{
        aes::{self, SecureKey},
        master_key::{clear_master_key, get_master_key},
    },
    error::{AppError, Result},
    gateway::proxy::{truncate, Transport},
    models::{
        proxy::ProxyRequest,
        session::{LoginResult, SessionData, StoredSession},
    },
    portal::{
        endpoints,
        login::{classify, combine_cookies, extract_anti_forgery_token, LoginOutcome, TOKEN_FIELD},
        profile::session_probe_is_valid,
    },
    repositories::{
        attendance as attendance_repo, profile as profile_repo, session as session_repo,
        sync_meta as sync_meta_repo, timetable as timetable_repo,
    },
    state::AppState,
};

/// Logs in to the portal and, on success, stores the encrypted session.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `username` - The portal username.
/// * `password` - The portal password.
/// * `remember_me` - Also keep the encrypted credentials for later re-login.
///
/// # Returns
///
/// The outcome. Gateway failures become a failed `LoginResult`, never an `Err`.
pub async fn login(state: &AppState, username: &str, password: &str, remember_me: bool) -> LoginResult {
    tracing::debug!("🔐 Login attempt for {}", username);

    let page = match state.transport.call(ProxyRequest::get(endpoints::LOGIN_PAGE)).await {
        Ok(page) => page,
        Err(e) => {
            tracing::error!("Login page fetch failed: {}", e);
            return LoginResult::failure(e.to_string());
        }
    };

    let token = extract_anti_forgery_token(&page.body);
    match &token {
        Some(t) => tracing::debug!("Anti-forgery token {}...", truncate(t, 8)),
        None => tracing::warn!("No anti-forgery token found, attempting login without it"),
    }

    let remember = if remember_me { "true" } else { "false" };
    let mut fields = vec![("UserName", username), ("Password", password), ("RememberMe", remember)];
    if let Some(t) = token.as_deref() {
        fields.push((TOKEN_FIELD, t));
    }
    let submit = ProxyRequest::post(endpoints::LOGIN_POST, fields).with_cookies(&page.set_cookies.join("; "));

    let response = match state.transport.call(submit).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Login submit failed: {}", e);
            return LoginResult::failure(e.to_string());
        }
    };

    if let LoginOutcome::Failure(reason) = classify(&response) {
        tracing::warn!("❌ Login rejected for {}: {}", username, reason);
        return LoginResult::failure(reason);
    }

    let cookies = combine_cookies(&page.set_cookies, &response.set_cookies);
    tracing::info!("✅ Login succeeded for {} ({}...)", username, truncate(&cookies, 20));

    let credentials = remember_me.then_some((username, password));
    if let Err(e) = persist_session(state, &cookies, credentials).await {
        tracing::error!("Failed to store session: {}", e);
    }

    LoginResult::success(cookies)
}

async fn persist_session(state: &AppState, cookies: &str, credentials: Option<(&str, &str)>) -> Result<()> {
    let key = get_master_key(state.store.as_ref(), &state.keys).await?;

    let (username, password) = match credentials {
        Some((username, password)) => (
            Some(aes::encrypt(&key, username)?),
            Some(aes::encrypt(&key, password)?),
        ),
        None => (None, None),
    };

    let session = SessionData {
        cookies: aes::encrypt(&key, cookies)?,
        last_validated: Utc::now().timestamp_millis(),
        username,
        password,
    };
    session_repo::set_session(state.store.as_ref(), &session).await?;
    tracing::debug!("Session stored");
    Ok(())
}

/// Asks the portal whether `cookies` still carry a live session. Any failure counts as no.
pub async fn validate_session(transport: &dyn Transport, cookies: &str) -> bool {
    let request = ProxyRequest::get(endpoints::CURRENT_SEM).with_cookies(cookies);
    match transport.call(request).await {
        Ok(response) => session_probe_is_valid(response.status, &response.body),
        Err(e) => {
            tracing::warn!("Session validation error: {}", e);
            false
        }
    }
}

/// Loads and decrypts the stored session.
///
/// An undecryptable record surfaces as `AppError::Decrypt`.
pub async fn get_stored_session(state: &AppState) -> Result<Option<StoredSession>> {
    let Some(data) = session_repo::get_session(state.store.as_ref()).await? else {
        return Ok(None);
    };
    let key = get_master_key(state.store.as_ref(), &state.keys).await?;

    Ok(Some(StoredSession {
        cookies: aes::decrypt(&key, &data.cookies)?,
        username: decrypt_optional(&key, data.username.as_deref())?,
        password: decrypt_optional(&key, data.password.as_deref())?,
    }))
}

fn decrypt_optional(key: &SecureKey, blob: Option<&str>) -> Result<Option<String>> {
    blob.map(|b| aes::decrypt(key, b)).transpose()
}

/// The stored session, or `None` after discarding one that cannot be read.
async fn load_session_or_discard(state: &AppState) -> Result<Option<StoredSession>> {
    match get_stored_session(state).await {
        Ok(session) => Ok(session),
        Err(AppError::Decrypt) => {
            tracing::warn!("Stored session is undecryptable, discarding it");
            session_repo::clear_session(state.store.as_ref()).await?;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Returns the stored session if the portal still accepts it, clearing it otherwise.
pub async fn check_stored_session(state: &AppState) -> Result<Option<StoredSession>> {
    let Some(session) = load_session_or_discard(state).await? else {
        return Ok(None);
    };

    if validate_session(state.transport.as_ref(), &session.cookies).await {
        return Ok(Some(session));
    }

    tracing::info!("Stored session rejected by the portal, clearing it");
    session_repo::clear_session(state.store.as_ref()).await?;
    Ok(None)
}

/// Like [`check_stored_session`], but logs in again with remembered credentials
/// before giving up on an expired session.
///
/// # Returns
///
/// Cookies of a live session, if one could be had.
pub async fn restore_session(state: &AppState) -> Result<Option<String>> {
    let Some(mut session) = load_session_or_discard(state).await? else {
        return Ok(None);
    };

    if validate_session(state.transport.as_ref(), &session.cookies).await {
        return Ok(Some(session.cookies));
    }

    if let Some((username, password)) = session.credentials() {
        tracing::info!("Session expired, logging in again as {}", username);
        let result = login(state, username, password, true).await;
        if let Some(password) = session.password.as_mut() {
            password.zeroize();
        }
        if result.success {
            return Ok(result.cookies);
        }
        tracing::warn!(
            "Re-login failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }

    session_repo::clear_session(state.store.as_ref()).await?;
    Ok(None)
}

/// Forgets the local session and tells the portal, best effort. Never fails.
pub async fn logout(state: &AppState) {
    let cookies = match get_stored_session(state).await {
        Ok(session) => session.map(|s| s.cookies),
        Err(e) => {
            tracing::warn!("Could not read session before logout: {}", e);
            None
        }
    };

    if let Err(e) = session_repo::clear_session(state.store.as_ref()).await {
        tracing::error!("Logout error: {}", e);
    }

    if let Some(cookies) = cookies {
        let request = ProxyRequest::get(endpoints::LOGOUT).with_cookies(&cookies);
        if let Err(e) = state.transport.call(request).await {
            tracing::debug!("Portal logout notification failed: {}", e);
        }
    }
    tracing::info!("👋 Logged out");
}

/// Wipes every collection, key material included.
pub async fn reset_all(state: &AppState) -> Result<()> {
    let store = state.store.as_ref();
    session_repo::clear_session(store).await?;
    profile_repo::clear_profile(store).await?;
    attendance_repo::clear_attendance(store).await?;
    timetable_repo::clear_timetable(store).await?;
    sync_meta_repo::clear_sync_meta(store).await?;
    clear_master_key(store, &state.keys).await?;
    tracing::warn!("🧹 Local cache and key material cleared");
    Ok(())
}
