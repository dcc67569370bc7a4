use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// HTTP methods the gateway forwards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProxyMethod {
    Get,
    Post,
}

/// One call the gateway should make against the portal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    /// Same-origin path, e.g. `/studentlogin`.
    pub target_path: String,
    pub method: ProxyMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_data: Option<BTreeMap<String, String>>,
    /// Value for the `Cookie` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,
}

impl ProxyRequest {
    pub fn get(target_path: &str) -> Self {
        Self {
            target_path: target_path.to_string(),
            method: ProxyMethod::Get,
            form_data: None,
            cookies: None,
        }
    }

    pub fn post<'a>(target_path: &str, fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            target_path: target_path.to_string(),
            method: ProxyMethod::Post,
            form_data: Some(
                fields
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            cookies: None,
        }
    }

    /// Attaches a cookie header; an empty string means no cookies.
    pub fn with_cookies(mut self, cookies: &str) -> Self {
        self.cookies = (!cookies.is_empty()).then(|| cookies.to_string());
        self
    }
}

/// What the portal answered.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status: u16,
    pub body: String,
    /// Raw `Set-Cookie` values in the order received.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set_cookies: Vec<String>,
}
