use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// PostgreSQL unique_violation, surfaced by PostgREST with HTTP 409.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Duplicate key violates unique constraint {0}")]
    Duplicate(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid header value: {0}")]
    Header(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DatabaseError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DatabaseError::Duplicate(_))
    }

    /// Name of the violated constraint, when this is a duplicate-key error.
    pub fn constraint(&self) -> Option<&str> {
        match self {
            DatabaseError::Duplicate(constraint) => Some(constraint.as_str()),
            _ => None,
        }
    }

    fn from_response(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let code = parsed
            .as_ref()
            .and_then(|v| v["code"].as_str())
            .unwrap_or_default();

        if status == 409 || code == UNIQUE_VIOLATION {
            let message = parsed
                .as_ref()
                .and_then(|v| v["message"].as_str())
                .unwrap_or(body);
            return DatabaseError::Duplicate(extract_constraint(message));
        }

        match status {
            401 | 403 => DatabaseError::Auth(body.to_string()),
            404 => DatabaseError::NotFound(body.to_string()),
            _ => DatabaseError::Api { status, message: body.to_string() },
        }
    }
}

fn extract_constraint(message: &str) -> String {
    message
        .split("unique constraint \"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap_or(message)
        .to_string()
}

/// Serializes a row for insert or patch. The database assigns ids.
pub fn row_without_id<T: Serialize>(row: &T) -> Result<Value, DatabaseError> {
    let mut value = serde_json::to_value(row)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("id");
    }
    Ok(value)
}

/// First row of a `return=representation` write.
pub fn first_row<T>(rows: Vec<T>, table: &str) -> Result<T, DatabaseError> {
    rows.into_iter().next().ok_or_else(|| DatabaseError::Api {
        status: 200,
        message: format!("Write to {} returned no rows", table),
    })
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key).map_err(|e| DatabaseError::Header(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Server-side calls without a user token act with the configured key.
        let bearer = auth_token.unwrap_or(&self.anon_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bearer))
                .map_err(|e| DatabaseError::Header(e.to_string()))?,
        );

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T, DatabaseError>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DatabaseError>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(DatabaseError::from_response(status.as_u16(), &error_text));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            // Minimal-return writes and DELETEs come back without a body.
            return Ok(serde_json::from_value(Value::Array(vec![]))?);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Header set asking PostgREST to echo the written rows.
    pub fn return_representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_maps_to_duplicate() {
        let body = r#"{"code":"23505","details":"Key exists","hint":null,"message":"duplicate key value violates unique constraint \"appointments_doctor_slot_active_key\""}"#;
        let err = DatabaseError::from_response(409, body);
        assert!(err.is_duplicate());
        assert_eq!(err.constraint(), Some("appointments_doctor_slot_active_key"));
    }

    #[test]
    fn test_other_statuses_keep_their_meaning() {
        assert!(matches!(DatabaseError::from_response(401, "nope"), DatabaseError::Auth(_)));
        assert!(matches!(DatabaseError::from_response(404, "gone"), DatabaseError::NotFound(_)));
        assert!(matches!(
            DatabaseError::from_response(500, "boom"),
            DatabaseError::Api { status: 500, .. }
        ));
    }
}
