//! REST gateway for a PostgREST-style remote store.
//!
//! Tables are addressed as `{base}/rest/v1/{table}`. Upserts are `POST`s
//! with `Prefer: resolution=merge-duplicates` and an `on_conflict` column
//! list; filters use the `column=eq.value` / `column=is.null` syntax.
//!
//! The HTTP client itself is abstracted via [`HttpClient`], so any blocking
//! HTTP library can be plugged in.

use crate::config::RemoteConfig;
use crate::error::{SyncError, SyncResult};
use crate::gateway::RemoteGateway;
use chrono::NaiveDate;
use liftlog_model::{ConflictKey, SessionRow, SetRow, UserId};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

const SETS_TABLE: &str = "sets";
const SESSIONS_TABLE: &str = "sessions";

/// HTTP method of a [`HttpRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// The method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Full URL including query.
    pub url: Url,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Body bytes, empty for none.
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Value of the first header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A received response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implementations return `Err` only for transport failures (DNS, refused
/// connections, timeouts); any response that arrived, whatever its status,
/// is `Ok`.
pub trait HttpClient: Send + Sync {
    /// Sends a request and waits for the response.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String>;
}

/// Remote gateway speaking the PostgREST dialect over [`HttpClient`].
///
/// Every request authorizes as the owner of the rows it touches: with the
/// owner's access token when one is registered through
/// [`RestGateway::set_access_token`], and with the anonymous key otherwise.
/// Queued writes of a signed-out user therefore keep their own token while
/// another user is signed in.
pub struct RestGateway<C: HttpClient> {
    base_url: Url,
    anon_key: String,
    access_tokens: RwLock<HashMap<UserId, String>>,
    client: C,
}

impl<C: HttpClient> RestGateway<C> {
    /// Creates a gateway for `config` using `client`.
    pub fn new(config: RemoteConfig, client: C) -> Self {
        Self {
            base_url: config.url,
            anon_key: config.anon_key,
            access_tokens: RwLock::new(HashMap::new()),
            client,
        }
    }

    /// Base URL of the remote project.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Registers the bearer token of `user`, or forgets it with `None`.
    ///
    /// The embedding application registers the token whenever the identity
    /// provider signs a user in or refreshes the session.
    pub fn set_access_token(&self, user: &UserId, token: Option<String>) {
        let mut tokens = self.access_tokens.write();
        match token {
            Some(token) => {
                tokens.insert(user.clone(), token);
            }
            None => {
                tokens.remove(user);
            }
        }
    }

    fn table_url(&self, table: &str) -> SyncResult<Url> {
        self.base_url
            .join(&format!("rest/v1/{table}"))
            .map_err(|e| SyncError::Config(format!("invalid table url: {e}")))
    }

    fn request(
        &self,
        method: HttpMethod,
        url: Url,
        body: Vec<u8>,
        owner: Option<&UserId>,
    ) -> HttpRequest {
        let bearer = owner
            .and_then(|user| self.access_tokens.read().get(user).cloned())
            .unwrap_or_else(|| self.anon_key.clone());

        let mut headers = vec![
            ("apikey".to_string(), self.anon_key.clone()),
            ("Authorization".to_string(), format!("Bearer {bearer}")),
        ];
        if method == HttpMethod::Post {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
            headers.push((
                "Prefer".to_string(),
                "resolution=merge-duplicates,return=minimal".to_string(),
            ));
        }

        HttpRequest {
            method,
            url,
            headers,
            body,
        }
    }

    fn execute(&self, request: HttpRequest) -> SyncResult<Vec<u8>> {
        debug!(method = request.method.as_str(), url = %request.url, "remote request");

        let response = self
            .client
            .send(&request)
            .map_err(SyncError::remote_retryable)?;

        if !response.is_success() {
            return Err(SyncError::Rejected {
                status: response.status,
                message: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
        Ok(response.body)
    }

    fn upsert<T: Serialize>(
        &self,
        table: &str,
        row: &T,
        owner: Option<&UserId>,
        key: ConflictKey,
    ) -> SyncResult<()> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("on_conflict", &key.to_query());

        let body = serde_json::to_vec(&[row])?;
        self.execute(self.request(HttpMethod::Post, url, body, owner))?;
        Ok(())
    }

    fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        owner: Option<&UserId>,
    ) -> SyncResult<Vec<T>> {
        let mut url = self.table_url(table)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "*");
            append_owner(&mut query, owner);
        }

        let body = self.execute(self.request(HttpMethod::Get, url, Vec::new(), owner))?;
        Ok(serde_json::from_slice(&body)?)
    }
}

fn append_owner(
    query: &mut url::form_urlencoded::Serializer<'_, url::UrlQuery<'_>>,
    owner: Option<&UserId>,
) {
    match owner {
        Some(user) => query.append_pair("user_id", &format!("eq.{user}")),
        None => query.append_pair("user_id", "is.null"),
    };
}

impl<C: HttpClient> RemoteGateway for RestGateway<C> {
    fn upsert_set(&self, row: &SetRow, key: ConflictKey) -> SyncResult<()> {
        self.upsert(SETS_TABLE, row, row.user_id.as_ref(), key)
    }

    fn delete_set(
        &self,
        exercise_id: &str,
        date: NaiveDate,
        set_index: u32,
        owner: Option<&UserId>,
    ) -> SyncResult<()> {
        let mut url = self.table_url(SETS_TABLE)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("exercise_id", &format!("eq.{exercise_id}"))
                .append_pair("date", &format!("eq.{date}"))
                .append_pair("set_index", &format!("eq.{set_index}"));
            append_owner(&mut query, owner);
        }

        self.execute(self.request(HttpMethod::Delete, url, Vec::new(), owner))?;
        Ok(())
    }

    fn upsert_session(&self, row: &SessionRow, key: ConflictKey) -> SyncResult<()> {
        self.upsert(SESSIONS_TABLE, row, row.user_id.as_ref(), key)
    }

    fn select_sets(&self, owner: Option<&UserId>) -> SyncResult<Vec<SetRow>> {
        self.select(SETS_TABLE, owner)
    }

    fn select_sessions(&self, owner: Option<&UserId>) -> SyncResult<Vec<SessionRow>> {
        self.select(SESSIONS_TABLE, owner)
    }
}
