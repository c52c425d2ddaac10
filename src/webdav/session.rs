use anyhow::anyhow;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use http_body_util::Full;
use hyper::{Request, Uri, header};
use tokio::time::{Duration, Instant, sleep_until, timeout};
use tracing::debug;

use crate::common::compression::{ACCEPTED_ENCODINGS, detect_encodings, read_body};
use crate::common::http::HyperClient;
use crate::config::DavSettings;
use crate::error::{DavError, Result};
use crate::webdav::types::{DavOutcome, DavRequest, DavResponse};
use crate::webdav::uri::DavUri;

/// Connection to one server authority (scheme, host, port).
///
/// A session sends requests strictly one after another. It resends a request
/// on transient failures until the caller's deadline passes, and it reports
/// redirects as [`DavOutcome::Redirect`] instead of following them.
pub struct DavSession {
    base: DavUri,
    client: HyperClient,
    auth_header: Option<header::HeaderValue>,
    request_timeout: Duration,
    retry_duration: Duration,
    resend_interval: Duration,
    credentials_okay: bool,
    last_request_end: Option<Instant>,
}

impl DavSession {
    /// Open a session for the authority of `base`.
    pub fn new(client: HyperClient, base: DavUri, settings: &DavSettings) -> Result<Self> {
        if !matches!(base.scheme.as_str(), "http" | "https") || base.host.is_empty() {
            return Err(DavError::Configuration(format!(
                "URL must be absolute http(s): {base}"
            )));
        }

        let auth_header = if settings.has_credentials() {
            let token = format!("{}:{}", settings.username(), settings.password());
            let val = format!("Basic {}", B64.encode(token));
            Some(
                header::HeaderValue::from_str(&val)
                    .map_err(|e| DavError::Configuration(format!("invalid credentials: {e}")))?,
            )
        } else {
            None
        };

        Ok(Self {
            base,
            client,
            auth_header,
            request_timeout: settings.request_timeout(),
            retry_duration: settings.retry_duration(),
            resend_interval: settings.resend_interval(),
            credentials_okay: false,
            last_request_end: None,
        })
    }

    /// Session for another authority, sharing client, credentials and
    /// retry settings.
    pub fn reopen(&self, base: DavUri) -> Self {
        Self {
            base,
            client: self.client.clone(),
            auth_header: self.auth_header.clone(),
            request_timeout: self.request_timeout,
            retry_duration: self.retry_duration,
            resend_interval: self.resend_interval,
            credentials_okay: self.credentials_okay,
            last_request_end: None,
        }
    }

    pub fn uri(&self) -> &DavUri {
        &self.base
    }

    /// Deadline for one logical operation, `None` when resending is disabled.
    pub fn deadline(&self) -> Option<Instant> {
        if self.retry_duration.is_zero() || self.resend_interval.is_zero() {
            None
        } else {
            Instant::now().checked_add(self.retry_duration)
        }
    }

    pub fn build_uri(&self, path: &str) -> anyhow::Result<Uri> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path.parse()?);
        }
        let path = if path.is_empty() { "/" } else { path };
        Ok(self.base.with_path(path).to_url().parse()?)
    }

    async fn dispatch(&self, request: &DavRequest) -> anyhow::Result<DavResponse> {
        let uri = self.build_uri(&request.path)?;
        let mut req_builder = Request::builder().method(request.method.clone()).uri(uri);

        if let Some(ref auth_header) = self.auth_header {
            req_builder = req_builder.header(header::AUTHORIZATION, auth_header);
        }
        req_builder = req_builder.header(header::ACCEPT_ENCODING, ACCEPTED_ENCODINGS);
        if request.body.is_some() && !request.headers.contains_key(header::CONTENT_TYPE) {
            req_builder = req_builder.header(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("application/xml; charset=utf-8"),
            );
        }
        for (k, v) in request.headers.iter() {
            req_builder = req_builder.header(k, v);
        }
        let req = req_builder.body(Full::new(request.body.clone().unwrap_or_default()))?;

        let exchange = async {
            let resp = self.client.request(req).await?;
            let encodings = detect_encodings(resp.headers());
            let (mut parts, body) = resp.into_parts();
            let body = read_body(body, &encodings).await?;
            if !encodings.is_empty() {
                parts.headers.remove(header::CONTENT_ENCODING);
                parts.headers.remove(header::CONTENT_LENGTH);
            }
            Ok::<_, anyhow::Error>(DavResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        };

        timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| anyhow!("request timed out"))?
    }

    fn is_retryable_status(&self, status: u16) -> bool {
        match status {
            // not implemented, HTTP version not supported
            501 | 505 => false,
            500..=599 => true,
            // some servers throttle with a spurious 401 after the
            // credentials were already accepted
            401 => self.credentials_okay,
            _ => false,
        }
    }

    /// Sleep until the next attempt may be sent. Returns false when the
    /// failure has to be reported instead.
    async fn wait_for_retry(
        &self,
        operation: &str,
        attempt: u32,
        deadline: Option<Instant>,
        failure: &DavError,
    ) -> bool {
        let Some(deadline) = deadline else {
            return false;
        };
        let now = Instant::now();
        if self.resend_interval.is_zero() || now >= deadline {
            return false;
        }

        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        let delay = self.resend_interval.saturating_mul(factor);
        let resend_at = self
            .last_request_end
            .unwrap_or(now)
            .checked_add(delay)
            .map_or(deadline, |at| at.min(deadline));
        debug!(
            operation,
            attempt,
            delay = ?resend_at.saturating_duration_since(now),
            "resending after transient failure: {failure}"
        );
        sleep_until(resend_at).await;
        true
    }

    /// Send the request produced by `build` until it yields a final answer.
    ///
    /// `build` receives the attempt number, starting at 1, so callers can
    /// attach preconditions to the first attempt only. Final statuses,
    /// including 4xx, come back as responses; transport failures and
    /// retryable statuses become errors once the deadline has passed.
    pub async fn run<F>(
        &mut self,
        operation: &str,
        deadline: Option<Instant>,
        mut build: F,
    ) -> Result<DavOutcome>
    where
        F: FnMut(u32) -> DavRequest,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let request = build(attempt);
            debug!(
                operation,
                attempt,
                method = %request.method,
                path = %request.path,
                host = %self.base.host,
                "sending request"
            );
            let result = self.dispatch(&request).await;
            self.last_request_end = Some(Instant::now());

            let failure = match result {
                Ok(response) => {
                    let status = response.status.as_u16();
                    if response.status.is_redirection()
                        && let Some(location) = response.location()
                    {
                        return Ok(DavOutcome::Redirect {
                            status,
                            location: location.to_string(),
                        });
                    }
                    if response.status.is_success() && self.auth_header.is_some() {
                        self.credentials_okay = true;
                    }
                    if !self.is_retryable_status(status) {
                        debug!(operation, status, "request finished");
                        return Ok(DavOutcome::Response(response));
                    }
                    DavError::from_status(operation, status)
                }
                Err(err) => DavError::Transport(format!("{operation}: {err:#}")),
            };

            if !self.wait_for_retry(operation, attempt, deadline, &failure).await {
                return Err(failure);
            }
        }
    }

    /// Like [`DavSession::run`], for operations where a redirect is a failure.
    pub async fn execute<F>(
        &mut self,
        operation: &str,
        deadline: Option<Instant>,
        build: F,
    ) -> Result<DavResponse>
    where
        F: FnMut(u32) -> DavRequest,
    {
        match self.run(operation, deadline, build).await? {
            DavOutcome::Response(response) => Ok(response),
            DavOutcome::Redirect { status, location } => {
                debug!(operation, status, %location, "unexpected redirect");
                Err(DavError::Status {
                    operation: operation.to_string(),
                    status,
                })
            }
        }
    }
}
