//! HTTP client for the walk API.
//!
//! Every authenticated request carries `Authorization: Bearer <token>`. A 401
//! triggers exactly one token refresh (`POST /auth/refresh`) followed by one
//! retry of the original request; if that still fails the caller gets
//! [`WalkError::Unauthorized`]. Concurrent 401s share a single refresh.

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{Mutex, RwLock};

use crate::api::{DiaryEntry, PresignedUpload, TrackPayload, WalkApi};
use crate::config::ApiConfig;
use crate::error::{Result, WalkError};
use crate::session::{Marking, WalkStatus};

#[derive(Debug, Clone)]
struct Tokens {
    access: String,
    refresh: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
}

/// Walk ids come back as strings or numbers depending on the backend.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WalkId {
    Text(String),
    Number(i64),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartWalkResponse {
    walk_id: WalkId,
}

/// reqwest-backed [`WalkApi`].
pub struct WalkApiClient {
    client: Client,
    base_url: String,
    tokens: RwLock<Tokens>,
    refresh_lock: Mutex<()>,
}

impl WalkApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens: RwLock::new(Tokens {
                access: config.access_token.clone(),
                refresh: config.refresh_token.clone(),
            }),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Build from `WALK_API_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(&ApiConfig::from_env()?)
    }

    /// Current bearer token.
    pub async fn access_token(&self) -> String {
        self.tokens.read().await.access.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        token: &str,
        query: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<Response> {
        let mut request = self.client.request(method, url).bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Send with the bearer token, refreshing and retrying once on 401.
    async fn send_authorized(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<Response> {
        let url = self.url(path);
        let token = self.access_token().await;
        debug!("[WalkApiClient] {} {}", method, url);

        let response = self.send(method.clone(), &url, &token, query, body.as_ref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check(response, &url).await;
        }

        warn!("[WalkApiClient] 401 from {}, refreshing token", url);
        self.refresh(&token).await?;

        let token = self.access_token().await;
        let response = self.send(method, &url, &token, query, body.as_ref()).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("[WalkApiClient] still unauthorized after refresh: {}", url);
            return Err(WalkError::Unauthorized);
        }
        check(response, &url).await
    }

    /// Exchange the refresh token for a new pair. `stale` is the access token
    /// that got the 401; if another request already replaced it, nothing is sent.
    async fn refresh(&self, stale: &str) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let refresh_token = {
            let tokens = self.tokens.read().await;
            if tokens.access != stale {
                debug!("[WalkApiClient] token already refreshed");
                return Ok(());
            }
            tokens.refresh.clone().ok_or(WalkError::Unauthorized)?
        };

        let url = self.url("/auth/refresh");
        let response = self
            .client
            .post(&url)
            .json(&RefreshRequest { refresh_token: &refresh_token })
            .send()
            .await?;
        if !response.status().is_success() {
            warn!("[WalkApiClient] token refresh rejected ({})", response.status());
            return Err(WalkError::Unauthorized);
        }

        let renewed: RefreshResponse = response.json().await?;
        let mut tokens = self.tokens.write().await;
        tokens.access = renewed.access_token;
        if let Some(refresh) = renewed.refresh_token {
            tokens.refresh = Some(refresh);
        }
        info!("[WalkApiClient] access token refreshed");
        Ok(())
    }
}

async fn check(response: Response, url: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(WalkError::Api { status: status.as_u16(), url: url.to_string(), body })
}

#[async_trait]
impl WalkApi for WalkApiClient {
    async fn start_walk(&self, course_id: Option<&str>) -> Result<String> {
        let body = match course_id {
            Some(id) => json!({ "courseId": id }),
            None => json!({}),
        };
        let response = self.send_authorized(Method::POST, "/walks", &[], Some(body)).await?;
        let started: StartWalkResponse = response.json().await?;
        let walk_id = match started.walk_id {
            WalkId::Text(id) => id,
            WalkId::Number(id) => id.to_string(),
        };
        info!("[WalkApiClient] started walk {}", walk_id);
        Ok(walk_id)
    }

    async fn update_track(&self, walk_id: &str, track: &TrackPayload) -> Result<()> {
        let body = serde_json::to_value(track)?;
        self.send_authorized(Method::PATCH, &format!("/walks/{}/track", walk_id), &[], Some(body))
            .await?;
        Ok(())
    }

    async fn update_status(&self, walk_id: &str, status: WalkStatus) -> Result<()> {
        let body = json!({ "status": status });
        self.send_authorized(Method::PATCH, &format!("/walks/{}/status", walk_id), &[], Some(body))
            .await?;
        Ok(())
    }

    async fn end_walk(&self, walk_id: &str, track: &TrackPayload) -> Result<()> {
        let body = serde_json::to_value(track)?;
        self.send_authorized(Method::PUT, &format!("/walks/{}/end", walk_id), &[], Some(body))
            .await?;
        info!("[WalkApiClient] ended walk {}", walk_id);
        Ok(())
    }

    async fn submit_score(&self, walk_id: &str, tailcopter_score: u32) -> Result<()> {
        let body = json!({ "tailcopterScore": tailcopter_score });
        self.send_authorized(Method::PUT, &format!("/walks/{}/score", walk_id), &[], Some(body))
            .await?;
        Ok(())
    }

    async fn save_diary(&self, walk_id: &str, diary: &DiaryEntry) -> Result<()> {
        let body = serde_json::to_value(diary)?;
        self.send_authorized(Method::POST, &format!("/walks/{}/diary", walk_id), &[], Some(body))
            .await?;
        Ok(())
    }

    async fn add_marking(&self, walk_id: &str, marking: &Marking) -> Result<()> {
        let body = serde_json::to_value(marking)?;
        self.send_authorized(Method::POST, &format!("/walks/{}/markings", walk_id), &[], Some(body))
            .await?;
        Ok(())
    }

    async fn presigned_upload(&self, file_name: &str) -> Result<PresignedUpload> {
        let response = self
            .send_authorized(Method::GET, "/uploads/presigned", &[("fileName", file_name)], None)
            .await?;
        Ok(response.json().await?)
    }

    async fn upload(&self, upload_url: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let size = bytes.len();
        let response = self
            .client
            .put(upload_url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WalkError::Upload(format!("PUT returned {}", status)));
        }
        debug!("[WalkApiClient] uploaded {} bytes", size);
        Ok(())
    }
}
