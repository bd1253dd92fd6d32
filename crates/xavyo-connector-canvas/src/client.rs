//! Canvas REST transport
//!
//! Thin wrapper over `reqwest` that authenticates every call, captures the
//! status, body and `Link` pagination hints of each response, and lets the
//! caller decide which statuses are acceptable.

use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace, warn};

use xavyo_connector::error::{ConnectorError, ConnectorResult};

use crate::config::CanvasConfig;

/// Page hint extracted from the `rel="next"` element of a `Link` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextPage {
    /// Value of the `page` parameter. Numeric or an opaque `bookmark:` token.
    pub page: String,
    /// Value of the `per_page` parameter, when present.
    pub per_page: Option<u32>,
}

/// A captured HTTP response.
#[derive(Debug, Clone)]
pub struct CanvasResponse {
    /// Method and path of the request, for error messages.
    pub request: String,
    /// Response status.
    pub status: StatusCode,
    /// Raw response body.
    pub body: String,
    /// Next page hint, if the response is one page of a collection.
    pub next_page: Option<NextPage>,
}

impl CanvasResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Build the error describing an unaccepted status.
    pub fn error(&self) -> ConnectorError {
        ConnectorError::unexpected_status(self.status.as_u16(), &self.request, &self.body)
    }

    /// Fail with [`ConnectorError::UnexpectedStatus`] unless the status is 2xx.
    pub fn ensure_success(self) -> ConnectorResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.error())
        }
    }

    /// Map a 404 to [`ConnectorError::ObjectNotFound`] for `identifier`.
    pub fn not_found_as(self, identifier: &str) -> ConnectorResult<Self> {
        if self.status == StatusCode::NOT_FOUND {
            debug!(request = %self.request, identifier = %identifier, "Object not found");
            Err(ConnectorError::not_found(identifier))
        } else {
            Ok(self)
        }
    }

    /// Deserialize the body.
    pub fn json<T: DeserializeOwned>(&self) -> ConnectorResult<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            ConnectorError::invalid_data(format!("unparseable response to {}: {e}", self.request))
        })
    }
}

/// Authenticated client for one Canvas tenant.
#[derive(Clone)]
pub struct CanvasClient {
    http: Client,
    api_base_url: String,
    auth_token: String,
}

impl std::fmt::Debug for CanvasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasClient")
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

impl CanvasClient {
    /// Build a client from a validated configuration.
    pub fn new(config: &CanvasConfig) -> ConnectorResult<Self> {
        let http = Client::builder()
            .timeout(config.connection.read_timeout())
            .connect_timeout(config.connection.connection_timeout())
            .build()
            .map_err(|e| ConnectorError::InvalidConfiguration {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            api_base_url: config.api_base_url(),
            auth_token: config.auth_token.clone(),
        })
    }

    /// GET `path` with the given query parameters.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> ConnectorResult<CanvasResponse> {
        self.send(Method::GET, path, query, None).await
    }

    /// POST a JSON body to `path`.
    pub async fn post(&self, path: &str, body: &Value) -> ConnectorResult<CanvasResponse> {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    /// PUT a JSON body to `path`.
    pub async fn put(&self, path: &str, body: &Value) -> ConnectorResult<CanvasResponse> {
        self.send(Method::PUT, path, &[], Some(body)).await
    }

    /// DELETE `path` with the given query parameters.
    pub async fn delete(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ConnectorResult<CanvasResponse> {
        self.send(Method::DELETE, path, query, None).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> ConnectorResult<CanvasResponse> {
        let url = format!("{}{}", self.api_base_url, path);
        let request = format!("{method} {path}");

        let mut builder = self
            .http
            .request(method, &url)
            .bearer_auth(&self.auth_token)
            .header(header::ACCEPT, "application/json");
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(json) = body {
            builder = builder.json(json);
        }

        debug!(request = %request, "Sending Canvas request");

        let response = builder
            .send()
            .await
            .map_err(|e| ConnectorError::network_with_source(format!("{request} failed"), e))?;

        let status = response.status();
        let next_page = parse_next_link(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| ConnectorError::network_with_source(format!("{request} body"), e))?;

        debug!(request = %request, status = %status, "Received Canvas response");
        trace!(request = %request, body = %body, "Canvas response body");

        Ok(CanvasResponse {
            request,
            status,
            body,
            next_page,
        })
    }
}

/// Extract the `rel="next"` page hint from `Link` headers.
pub fn parse_next_link(headers: &header::HeaderMap) -> Option<NextPage> {
    headers
        .get_all(header::LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(parse_link_element)
}

fn parse_link_element(element: &str) -> Option<NextPage> {
    let element = element.trim();
    let start = element.find('<')?;
    let end = element.find('>')?;
    if end <= start {
        return None;
    }

    let is_next = element[end + 1..].split(';').any(|param| {
        let param = param.trim();
        param == "rel=\"next\"" || param == "rel=next"
    });
    if !is_next {
        return None;
    }

    let target = &element[start + 1..end];
    let url = match url::Url::parse(target) {
        Ok(url) => url,
        Err(e) => {
            warn!(link = %target, error = %e, "Ignoring unparseable next link");
            return None;
        }
    };

    let mut page = None;
    let mut per_page = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "page" => page = Some(value.into_owned()),
            "per_page" => per_page = value.parse().ok(),
            _ => {}
        }
    }

    page.map(|page| NextPage { page, per_page })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn headers(link: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(header::LINK, HeaderValue::from_str(link).unwrap());
        map
    }

    #[test]
    fn test_parse_numeric_next_link() {
        let map = headers(
            "<https://x.test/api/v1/accounts/1/users?page=1&per_page=10>; rel=\"current\",\
             <https://x.test/api/v1/accounts/1/users?page=2&per_page=10>; rel=\"next\",\
             <https://x.test/api/v1/accounts/1/users?page=1&per_page=10>; rel=\"first\"",
        );
        assert_eq!(
            parse_next_link(&map),
            Some(NextPage {
                page: "2".to_string(),
                per_page: Some(10)
            })
        );
    }

    #[test]
    fn test_parse_bookmark_next_link() {
        let map = headers(
            "<https://x.test/api/v1/courses/5/enrollments?state%5B%5D=active&page=bookmark:WzEsMl0&per_page=100>; rel=\"next\"",
        );
        let next = parse_next_link(&map).unwrap();
        assert_eq!(next.page, "bookmark:WzEsMl0");
        assert_eq!(next.per_page, Some(100));
    }

    #[test]
    fn test_no_next_link_on_last_page() {
        let map = headers(
            "<https://x.test/api/v1/users?page=3&per_page=10>; rel=\"current\",\
             <https://x.test/api/v1/users?page=1&per_page=10>; rel=\"first\"",
        );
        assert_eq!(parse_next_link(&map), None);
        assert_eq!(parse_next_link(&HeaderMap::new()), None);
    }

    #[test]
    fn test_per_page_is_not_mistaken_for_page() {
        let map = headers("<https://x.test/api/v1/users?per_page=7>; rel=\"next\"");
        assert_eq!(parse_next_link(&map), None);
    }

    fn response(status: u16, body: &str) -> CanvasResponse {
        CanvasResponse {
            request: "GET /users/1".to_string(),
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
            next_page: None,
        }
    }

    #[test]
    fn test_not_found_mapping() {
        let err = response(404, "{}").not_found_as("1").unwrap_err();
        assert!(matches!(err, ConnectorError::ObjectNotFound { identifier } if identifier == "1"));
        assert!(response(200, "{}").not_found_as("1").is_ok());
    }

    #[test]
    fn test_ensure_success_carries_status_and_body() {
        let err = response(500, "boom").ensure_success().unwrap_err();
        match err {
            ConnectorError::UnexpectedStatus {
                status,
                request,
                body,
            } => {
                assert_eq!(status, 500);
                assert_eq!(request, "GET /users/1");
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_json_parse_error_is_invalid_data() {
        let err = response(200, "not json").json::<Value>().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DATA");
    }
}
