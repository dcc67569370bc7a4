//! Login page scraping and login-response classification.

use crate::{models::proxy::ProxyResponse, portal::html::to_lower};

pub const TOKEN_FIELD: &str = "__RequestVerificationToken";

const DEFAULT_FAILURE: &str = "Login failed - please check your credentials";
const ERROR_PAGE_FAILURE: &str = "Login endpoint returned an error. Please check your credentials.";
const ERROR_PAGE_MARKERS: [&str; 3] = ["404", "Something Went Wrong", "Oops"];
const SESSION_COOKIE_HINTS: [&str; 3] = ["aspnet", "session", "auth"];
const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];
/// Redirect pages are tiny; a re-rendered login form is not.
const SMALL_BODY_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy)]
enum TokenPattern {
    DoubleQuotedNameValue,
    DoubleQuotedValueName,
    SingleQuotedNameValue,
    Unquoted,
}

const TOKEN_PATTERNS: [TokenPattern; 4] = [
    TokenPattern::DoubleQuotedNameValue,
    TokenPattern::DoubleQuotedValueName,
    TokenPattern::SingleQuotedNameValue,
    TokenPattern::Unquoted,
];

/// Pulls the anti-forgery token out of the login page.
///
/// Each attribute layout is tried against every `<input>` before moving to the next.
pub fn extract_anti_forgery_token(html: &str) -> Option<String> {
    let inputs = input_tags(html);
    for pattern in TOKEN_PATTERNS {
        for tag in &inputs {
            if let Some(token) = match_token(tag, pattern) {
                tracing::debug!("Found anti-forgery token with {:?}", pattern);
                return Some(token.to_string());
            }
        }
    }
    None
}

/// The text of every `<input ...>` tag, without the closing `>`.
fn input_tags(html: &str) -> Vec<&str> {
    let lc = to_lower(html);
    let mut tags = Vec::new();
    let mut pos = 0usize;
    while let Some(rel) = lc[pos..].find("<input") {
        let start = pos + rel;
        let end = match lc[start..].find('>') {
            Some(e) => start + e,
            None => break,
        };
        tags.push(&html[start..end]);
        pos = end;
    }
    tags
}

fn match_token(tag: &str, pattern: TokenPattern) -> Option<&str> {
    let lc = to_lower(tag);
    let field = to_lower(TOKEN_FIELD);

    match pattern {
        TokenPattern::DoubleQuotedNameValue => quoted_value_after_name(tag, &lc, &field, '"'),
        TokenPattern::SingleQuotedNameValue => quoted_value_after_name(tag, &lc, &field, '\''),
        TokenPattern::DoubleQuotedValueName => {
            let name = format!("name=\"{}\"", field);
            let mut pos = 0usize;
            while let Some(rel) = lc[pos..].find("value=\"") {
                let start = pos + rel + "value=\"".len();
                let len = tag[start..].find('"')?;
                if len > 0 && lc[start + len..].contains(&name) {
                    return Some(&tag[start..start + len]);
                }
                pos = start;
            }
            None
        }
        TokenPattern::Unquoted => {
            let name = format!("name={}", field);
            let after_name = lc.find(&name)? + name.len();
            let start = lc[after_name..].find("value=")? + after_name + "value=".len();
            let len = tag[start..]
                .find(|c: char| c.is_whitespace() || c == '>')
                .unwrap_or(tag.len() - start);
            (len > 0).then(|| &tag[start..start + len])
        }
    }
}

fn quoted_value_after_name<'a>(tag: &'a str, lc: &str, field: &str, quote: char) -> Option<&'a str> {
    let name = format!("name={q}{field}{q}", q = quote);
    let value = format!("value={}", quote);
    let after_name = lc.find(&name)? + name.len();
    let start = lc[after_name..].find(&value)? + after_name + value.len();
    let len = tag[start..].find(quote)?;
    (len > 0).then(|| &tag[start..start + len])
}

/// Verdict on the login-submit response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    Failure(String),
}

/// Decides whether the portal accepted the credentials.
pub fn classify(response: &ProxyResponse) -> LoginOutcome {
    let body = &response.body;

    if ERROR_PAGE_MARKERS.iter().any(|m| body.contains(m)) {
        return LoginOutcome::Failure(ERROR_PAGE_FAILURE.to_string());
    }

    let has_session_cookie = response.set_cookies.iter().any(|c| {
        let name = to_lower(cookie_name(c));
        SESSION_COOKIE_HINTS.iter().any(|hint| name.contains(hint))
    });
    let is_redirect = REDIRECT_STATUSES.contains(&response.status);

    let lc = to_lower(body);
    let mentions_student_area =
        lc.contains("/student/") || lc.contains("student/home") || lc.contains("logout");
    let is_small = body.chars().count() < SMALL_BODY_LIMIT;

    tracing::debug!(
        status = response.status,
        has_session_cookie,
        is_redirect,
        mentions_student_area,
        is_small,
        "Classifying login response"
    );

    if has_session_cookie || is_redirect || (mentions_student_area && is_small) {
        LoginOutcome::Success
    } else {
        LoginOutcome::Failure(error_message(body).unwrap_or_else(|| DEFAULT_FAILURE.to_string()))
    }
}

/// Text following the first `error...>` marker, up to the next tag.
fn error_message(body: &str) -> Option<String> {
    let lc = to_lower(body);
    let mut pos = 0usize;
    while let Some(rel) = lc[pos..].find("error") {
        let start = pos + rel;
        let rest = &lc[start + "error".len()..];
        let gt = rest.find('>');
        let lt = rest.find('<');
        if let Some(gt) = gt.filter(|gt| lt.is_none_or(|lt| *gt < lt)) {
            let text_start = start + "error".len() + gt + 1;
            let text_len = body[text_start..].find('<').unwrap_or(body.len() - text_start);
            let text = body[text_start..text_start + text_len].trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
        pos = start + "error".len();
    }
    None
}

fn cookie_name(set_cookie: &str) -> &str {
    let pair = cookie_pair(set_cookie);
    pair.split('=').next().unwrap_or(pair).trim()
}

/// `name=value` part of a `Set-Cookie` value, attributes dropped.
pub fn cookie_pair(set_cookie: &str) -> &str {
    set_cookie.split(';').next().unwrap_or(set_cookie).trim()
}

/// Joins the cookies from the login page and the login submit into one `Cookie` header.
pub fn combine_cookies(first: &[String], second: &[String]) -> String {
    first
        .iter()
        .chain(second)
        .map(|c| cookie_pair(c))
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str, cookies: &[&str]) -> ProxyResponse {
        ProxyResponse {
            status,
            body: body.to_string(),
            set_cookies: cookies.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_token_name_then_value() {
        let html = r#"<form><input type="hidden" name="__RequestVerificationToken" value="abc123" /></form>"#;
        assert_eq!(extract_anti_forgery_token(html).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_token_value_then_name() {
        let html = r#"<INPUT value="abc123" type="hidden" NAME="__requestverificationtoken">"#;
        assert_eq!(extract_anti_forgery_token(html).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_token_single_quotes_and_unquoted() {
        let single = "<input name='__RequestVerificationToken' type='hidden' value='abc123'>";
        assert_eq!(extract_anti_forgery_token(single).as_deref(), Some("abc123"));

        let bare = "<input name=__RequestVerificationToken value=abc123>";
        assert_eq!(extract_anti_forgery_token(bare).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_token_match_is_confined_to_one_input() {
        let html = r#"<input name="__RequestVerificationToken"><input name="UserName" value="alice">"#;
        assert_eq!(extract_anti_forgery_token(html), None);
        assert_eq!(extract_anti_forgery_token("<html><body>no form</body></html>"), None);
    }

    #[test]
    fn test_redirect_without_cookie_is_success() {
        assert_eq!(classify(&response(302, "", &[])), LoginOutcome::Success);
    }

    #[test]
    fn test_session_cookie_is_success() {
        let r = response(200, "<html>big page</html>", &[".ASPXAUTH=abc; path=/; HttpOnly"]);
        assert_eq!(classify(&r), LoginOutcome::Success);

        let r = response(200, "<html>page</html>", &["theme=dark; auth-hint=1"]);
        assert_ne!(classify(&r), LoginOutcome::Success);
    }

    #[test]
    fn test_small_body_pointing_at_student_area_is_success() {
        let r = response(200, r#"<a href="/Student/Home">continue</a>"#, &[]);
        assert_eq!(classify(&r), LoginOutcome::Success);
    }

    #[test]
    fn test_rerendered_login_form_is_failure() {
        let mut body = String::from(r#"<form action="/StudentLogin/Create"><a href="/Student/Home">home</a>"#);
        while body.len() < 5 * 1024 {
            body.push_str(r#"<input type="text" name="UserName" class="form-control" />"#);
        }
        body.push_str("</form>");

        assert_eq!(
            classify(&response(200, &body, &[])),
            LoginOutcome::Failure(DEFAULT_FAILURE.to_string())
        );
    }

    #[test]
    fn test_error_page_short_circuits() {
        let r = response(302, "<h1>Oops</h1>", &["ASP.NET_SessionId=x"]);
        assert_eq!(classify(&r), LoginOutcome::Failure(ERROR_PAGE_FAILURE.to_string()));
    }

    #[test]
    fn test_failure_carries_portal_error_text() {
        let mut body = String::from(r#"<div class="validation-summary-errors"> Invalid username or password </div>"#);
        body.push_str(&"<p>filler</p>".repeat(100));
        assert_eq!(
            classify(&response(200, &body, &[])),
            LoginOutcome::Failure("Invalid username or password".to_string())
        );
    }

    #[test]
    fn test_combine_cookies_keeps_name_value_only() {
        let first = vec!["ASP.NET_SessionId=s1; path=/; HttpOnly".to_string()];
        let second = vec![
            "__RequestVerificationToken=t; path=/".to_string(),
            ".ASPXAUTH=a; expires=Thu, 01 Jan 2026 00:00:00 GMT".to_string(),
        ];
        assert_eq!(
            combine_cookies(&first, &second),
            "ASP.NET_SessionId=s1; __RequestVerificationToken=t; .ASPXAUTH=a"
        );
        assert_eq!(combine_cookies(&[], &[]), "");
    }
}
