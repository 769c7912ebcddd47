//! Mastodon REST client
//!
//! Talks to any server implementing the Mastodon client API. Paged endpoints
//! return their cursors in the `Link` header; the `max_id` of the `next` link
//! becomes [`PageCursor::next`] and the `min_id` (or `since_id`) of the `prev`
//! link becomes [`PageCursor::previous`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::{
    AccountSource, AppRegistration, RemoteClient, RemoteResult, Session, StatusChange,
    StatusSource,
};
use crate::config::InstanceConfig;
use crate::error::RemoteError;
use crate::pagination::{Direction, Page, PageCursor, PageRequest};
use crate::types::{Account, Notification, Status};

/// Mastodon client backed by reqwest.
pub struct MastodonClient {
    http: Client,
    client_name: String,
    redirect_uri: String,
    website: Option<String>,
    scopes: String,
}

impl MastodonClient {
    pub fn new(config: &InstanceConfig) -> RemoteResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("tusk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            client_name: config.client_name.clone(),
            redirect_uri: config.redirect_uri.clone(),
            website: config.website.clone(),
            scopes: config.scopes.join(" "),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        session: &Session,
        url: Url,
        context: &str,
    ) -> RemoteResult<T> {
        let response = self.send(self.http.get(url).bearer_auth(&session.access_token), context).await?;
        decode(response, context).await
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        session: &Session,
        mut url: Url,
        request: &PageRequest,
        context: &str,
    ) -> RemoteResult<Page<T>> {
        apply_page_request(&mut url, request);
        tracing::debug!(%url, direction = ?request.direction, "fetching page");

        let response = self.send(self.http.get(url).bearer_auth(&session.access_token), context).await?;
        let cursor = cursor_from_headers(response.headers());
        let items: Vec<T> = decode(response, context).await?;
        Ok(Page::new(items, cursor))
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context: &str,
    ) -> RemoteResult<T> {
        let response = self.send(builder, context).await?;
        decode(response, context).await
    }

    async fn send(&self, builder: RequestBuilder, context: &str) -> RemoteResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::Network(format!("{}: {}", context, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_status_error(status, &body, context))
    }
}

#[async_trait]
impl RemoteClient for MastodonClient {
    async fn register_app(&self, instance: &str) -> RemoteResult<AppRegistration> {
        let url = endpoint(instance, "api/v1/apps")?;
        let body = serde_json::json!({
            "client_name": self.client_name,
            "redirect_uris": self.redirect_uri,
            "scopes": self.scopes,
            "website": self.website,
        });
        tracing::debug!(instance, "registering application");
        self.post_json(self.http.post(url).json(&body), "register app").await
    }

    fn authorization_url(&self, instance: &str, app: &AppRegistration) -> RemoteResult<String> {
        let mut url = endpoint(instance, "oauth/authorize")?;
        url.query_pairs_mut()
            .append_pair("client_id", &app.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scopes);
        Ok(url.into())
    }

    async fn exchange_code(
        &self,
        instance: &str,
        app: &AppRegistration,
        code: &str,
    ) -> RemoteResult<String> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let url = endpoint(instance, "oauth/token")?;
        let body = serde_json::json!({
            "grant_type": "authorization_code",
            "code": code,
            "client_id": app.client_id,
            "client_secret": app.client_secret,
            "redirect_uri": self.redirect_uri,
            "scope": self.scopes,
        });
        let token: TokenResponse = self.post_json(self.http.post(url).json(&body), "token exchange").await?;
        Ok(token.access_token)
    }

    async fn verify_credentials(&self, session: &Session) -> RemoteResult<Account> {
        let url = endpoint(&session.instance, "api/v1/accounts/verify_credentials")?;
        self.get_json(session, url, "verify credentials").await
    }

    async fn fetch_account(&self, session: &Session, account_id: &str) -> RemoteResult<Account> {
        let url = endpoint(&session.instance, &format!("api/v1/accounts/{}", account_id))?;
        self.get_json(session, url, "fetch account").await
    }

    async fn fetch_statuses(
        &self,
        session: &Session,
        source: &StatusSource,
        request: &PageRequest,
    ) -> RemoteResult<Page<Status>> {
        let path = match source {
            StatusSource::Home => "api/v1/timelines/home".to_string(),
            StatusSource::Favourites => "api/v1/favourites".to_string(),
            StatusSource::Account(id) => format!("api/v1/accounts/{}/statuses", id),
        };
        let url = endpoint(&session.instance, &path)?;
        self.get_page(session, url, request, "fetch statuses").await
    }

    async fn fetch_accounts(
        &self,
        session: &Session,
        source: &AccountSource,
        request: &PageRequest,
    ) -> RemoteResult<Page<Account>> {
        let path = match source {
            AccountSource::Followers(id) => format!("api/v1/accounts/{}/followers", id),
            AccountSource::Following(id) => format!("api/v1/accounts/{}/following", id),
        };
        let url = endpoint(&session.instance, &path)?;
        self.get_page(session, url, request, "fetch accounts").await
    }

    async fn fetch_notifications(
        &self,
        session: &Session,
        request: &PageRequest,
    ) -> RemoteResult<Page<Notification>> {
        let url = endpoint(&session.instance, "api/v1/notifications")?;
        self.get_page(session, url, request, "fetch notifications").await
    }

    async fn fetch_pinned(
        &self,
        session: &Session,
        account_id: &str,
        limit: usize,
    ) -> RemoteResult<Vec<Status>> {
        let mut url = endpoint(&session.instance, &format!("api/v1/accounts/{}/statuses", account_id))?;
        url.query_pairs_mut()
            .append_pair("pinned", "true")
            .append_pair("limit", &limit.to_string());
        self.get_json(session, url, "fetch pinned statuses").await
    }

    async fn update_status(
        &self,
        session: &Session,
        status_id: &str,
        change: StatusChange,
    ) -> RemoteResult<Status> {
        let verb = match change {
            StatusChange::Favourite(true) => "favourite",
            StatusChange::Favourite(false) => "unfavourite",
            StatusChange::Reblog(true) => "reblog",
            StatusChange::Reblog(false) => "unreblog",
        };
        let url = endpoint(&session.instance, &format!("api/v1/statuses/{}/{}", status_id, verb))?;
        let builder = self.http.post(url).bearer_auth(&session.access_token);
        let status: Status = self.post_json(builder, verb).await?;

        // reblogging answers with the new boost wrapping the original
        Ok(match status.reblog {
            Some(original) if original.id == status_id => *original,
            _ => status,
        })
    }
}

/// Base URL for an instance host, `https` unless a scheme is given.
pub fn instance_url(instance: &str) -> RemoteResult<Url> {
    let trimmed = instance.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(RemoteError::Validation("Instance host is empty".to_string()));
    }
    let raw = if trimmed.contains("://") {
        format!("{}/", trimmed)
    } else {
        format!("https://{}/", trimmed)
    };
    Url::parse(&raw).map_err(|e| RemoteError::Validation(format!("Invalid instance '{}': {}", instance, e)))
}

fn endpoint(instance: &str, path: &str) -> RemoteResult<Url> {
    instance_url(instance)?
        .join(path)
        .map_err(|e| RemoteError::Validation(format!("Invalid endpoint {}: {}", path, e)))
}

fn apply_page_request(url: &mut Url, request: &PageRequest) {
    let mut query = url.query_pairs_mut();
    query.append_pair("limit", &request.limit.to_string());
    if let Some(token) = &request.cursor {
        match request.direction {
            Direction::Older => {
                query.append_pair("max_id", token);
            }
            Direction::Newer => {
                query.append_pair("min_id", token);
            }
            Direction::Reload => {}
        }
    }
}

/// Read the page cursor out of a `Link` header.
pub fn cursor_from_headers(headers: &HeaderMap) -> PageCursor {
    headers
        .get(LINK)
        .and_then(|value| value.to_str().ok())
        .map(parse_link_header)
        .unwrap_or_default()
}

pub fn parse_link_header(header: &str) -> PageCursor {
    let mut cursor = PageCursor::default();
    for link in header.split(',') {
        let mut parts = link.split(';');
        let Some(target) = parts.next() else { continue };
        let target = target.trim().trim_start_matches('<').trim_end_matches('>');
        let Ok(url) = Url::parse(target) else { continue };

        let rel = parts
            .filter_map(|p| p.trim().strip_prefix("rel="))
            .map(|r| r.trim_matches('"'))
            .next();
        let query_value = |keys: &[&str]| {
            url.query_pairs()
                .find(|(k, _)| keys.contains(&k.as_ref()))
                .map(|(_, v)| v.into_owned())
        };

        match rel {
            Some("next") => cursor.next = query_value(&["max_id"]),
            Some("prev") => cursor.previous = query_value(&["min_id", "since_id"]),
            _ => {}
        }
    }
    cursor
}

/// Map an unsuccessful HTTP status onto [`RemoteError`].
pub fn map_status_error(status: StatusCode, body: &str, context: &str) -> RemoteError {
    #[derive(Deserialize)]
    struct ApiError {
        error: String,
    }

    let detail = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| status.to_string());
    let message = format!("{} ({}): {}", context, status.as_u16(), detail);

    match status.as_u16() {
        401 | 403 => RemoteError::Authentication(message),
        422 => RemoteError::Validation(message),
        429 => RemoteError::RateLimit(message),
        400..=499 => RemoteError::Validation(message),
        _ => RemoteError::Network(message),
    }
}

async fn decode<T: DeserializeOwned>(response: Response, context: &str) -> RemoteResult<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| RemoteError::Network(format!("{}: {}", context, e)))?;
    serde_json::from_slice(&bytes).map_err(|e| RemoteError::Parse(format!("{}: {}", context, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn client() -> MastodonClient {
        MastodonClient::new(&InstanceConfig::default()).unwrap()
    }

    #[test]
    fn test_instance_url_defaults_to_https() {
        assert_eq!(instance_url("mastodon.social").unwrap().as_str(), "https://mastodon.social/");
        assert_eq!(instance_url("http://127.0.0.1:3000/").unwrap().as_str(), "http://127.0.0.1:3000/");
        assert!(instance_url("  ").is_err());
    }

    #[test]
    fn test_endpoint_joins_path() {
        let url = endpoint("example.social", "api/v1/timelines/home").unwrap();
        assert_eq!(url.as_str(), "https://example.social/api/v1/timelines/home");
    }

    #[test]
    fn test_parse_link_header() {
        let header = "<https://example.social/api/v1/timelines/home?limit=40&max_id=109>; rel=\"next\", \
                      <https://example.social/api/v1/timelines/home?limit=40&min_id=120>; rel=\"prev\"";
        assert_eq!(parse_link_header(header), PageCursor::new(Some("109"), Some("120")));
    }

    #[test]
    fn test_parse_link_header_since_id_and_missing_rel() {
        let header = "<https://example.social/api/v1/notifications?since_id=55>; rel=\"prev\"";
        assert_eq!(parse_link_header(header), PageCursor::new(None, Some("55")));
        assert_eq!(parse_link_header("garbage"), PageCursor::default());
    }

    #[test]
    fn test_cursor_from_headers_without_link() {
        assert_eq!(cursor_from_headers(&HeaderMap::new()), PageCursor::default());

        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static("<https://example.social/api/v1/favourites?max_id=7>; rel=\"next\""),
        );
        assert_eq!(cursor_from_headers(&headers).next.as_deref(), Some("7"));
    }

    #[test]
    fn test_apply_page_request_by_direction() {
        let base = endpoint("example.social", "api/v1/timelines/home").unwrap();

        let mut url = base.clone();
        apply_page_request(&mut url, &PageRequest { id: 1, direction: Direction::Older, cursor: Some("c1".into()), limit: 40 });
        assert_eq!(url.query(), Some("limit=40&max_id=c1"));

        let mut url = base.clone();
        apply_page_request(&mut url, &PageRequest { id: 1, direction: Direction::Newer, cursor: Some("p1".into()), limit: 80 });
        assert_eq!(url.query(), Some("limit=80&min_id=p1"));

        let mut url = base;
        apply_page_request(&mut url, &PageRequest { id: 1, direction: Direction::Reload, cursor: None, limit: 40 });
        assert_eq!(url.query(), Some("limit=40"));
    }

    #[test]
    fn test_map_status_error() {
        let body = r#"{"error":"The access token is invalid"}"#;
        let err = map_status_error(StatusCode::UNAUTHORIZED, body, "fetch statuses");
        assert!(err.is_authentication());
        assert!(err.to_string().contains("The access token is invalid"));

        assert!(matches!(map_status_error(StatusCode::UNPROCESSABLE_ENTITY, "", "x"), RemoteError::Validation(_)));
        assert!(matches!(map_status_error(StatusCode::TOO_MANY_REQUESTS, "", "x"), RemoteError::RateLimit(_)));
        assert!(matches!(map_status_error(StatusCode::BAD_GATEWAY, "<html>", "x"), RemoteError::Network(_)));
        assert!(matches!(map_status_error(StatusCode::NOT_FOUND, "", "x"), RemoteError::Validation(_)));
    }

    #[test]
    fn test_authorization_url() {
        let app = AppRegistration {
            client_id: "abc".to_string(),
            client_secret: "shh".to_string(),
        };
        let url = client().authorization_url("example.social", &app).unwrap();
        assert!(url.starts_with("https://example.social/oauth/authorize?"));
        assert!(url.contains("client_id=abc"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=read+write+follow"));
        assert!(!url.contains("shh"));
    }

    #[test]
    fn test_authorization_url_rejects_bad_instance() {
        let app = AppRegistration {
            client_id: "abc".to_string(),
            client_secret: "shh".to_string(),
        };
        assert!(client().authorization_url("", &app).is_err());
    }
}
