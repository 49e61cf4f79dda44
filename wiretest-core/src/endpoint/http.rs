//! Plain HTTP endpoints: a blocking client and an adapter-backed server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::sync::oneshot;

use crate::context::TestContext;
use crate::error::WiretestError;
use crate::message::headers::is_internal;
use crate::message::Message;

use super::{DirectEndpoint, Endpoint, EndpointAdapter, MessageSelector};

/// Header carrying the numeric status of an HTTP response message, and the
/// status a server adapter response asks to be sent with.
pub const HTTP_STATUS_CODE: &str = "wiretest_http_status_code";
/// Header carrying the request method; selects the method on client sends.
pub const HTTP_METHOD: &str = "wiretest_http_method";
/// Header carrying the request path on server-received messages.
pub const HTTP_REQUEST_URI: &str = "wiretest_http_request_uri";

/// Client endpoint: sends each message as an HTTP request and queues the
/// response for the next receive.
pub struct HttpClientEndpoint {
    url: String,
    client: reqwest::blocking::Client,
    replies: DirectEndpoint,
}

impl HttpClientEndpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        HttpClientEndpoint {
            url: url.into(),
            client: reqwest::blocking::Client::new(),
            replies: DirectEndpoint::new(name),
        }
    }

    pub fn with_receive_timeout(
        name: impl Into<String>,
        url: impl Into<String>,
        receive_timeout: Duration,
    ) -> Self {
        HttpClientEndpoint {
            url: url.into(),
            client: reqwest::blocking::Client::new(),
            replies: DirectEndpoint::with_receive_timeout(name, receive_timeout),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Endpoint for HttpClientEndpoint {
    fn name(&self) -> &str {
        self.replies.name()
    }

    fn receive_timeout(&self) -> Duration {
        self.replies.receive_timeout()
    }

    fn send(&self, message: Message, context: &TestContext) -> Result<(), WiretestError> {
        let method_name = message.header(HTTP_METHOD).unwrap_or("POST");
        let method = reqwest::Method::from_bytes(method_name.as_bytes()).map_err(|_| {
            WiretestError::dispatch(format!("invalid http method '{method_name}'"))
        })?;
        let mut request = self
            .client
            .request(method, &self.url)
            .body(message.payload().to_string());
        for (name, value) in message.headers() {
            if is_internal(name) || name.as_str() == HTTP_METHOD {
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }
        log::debug!(
            "sending http request to '{}': {}",
            self.url,
            context.mask(message.payload())
        );
        let response = request.send().map_err(|error| {
            WiretestError::dispatch(format!("http request to '{}' failed: {error}", self.url))
        })?;
        let status = response.status();
        let mut reply_headers = Vec::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                reply_headers.push((name.as_str().to_string(), value.to_string()));
            }
        }
        let body = response.text().map_err(|error| {
            WiretestError::dispatch(format!(
                "failed to read http response from '{}': {error}",
                self.url
            ))
        })?;
        let mut reply = Message::new(body);
        for (name, value) in reply_headers {
            reply.set_header(name, value);
        }
        reply.set_header(HTTP_STATUS_CODE, status.as_u16().to_string());
        self.replies.send(reply, context)
    }

    fn receive_selected(
        &self,
        selector: &MessageSelector,
        timeout: Duration,
        context: &TestContext,
    ) -> Result<Message, WiretestError> {
        self.replies.receive_selected(selector, timeout, context)
    }
}

#[derive(Clone)]
struct ServerShared {
    adapter: Arc<dyn EndpointAdapter>,
    requests: DirectEndpoint,
}

/// Server endpoint: answers inbound HTTP requests through an endpoint
/// adapter and records each request for receive actions.
///
/// The axum router runs on a dedicated thread with its own current-thread
/// runtime; dropping the endpoint shuts the server down.
pub struct HttpServerEndpoint {
    requests: DirectEndpoint,
    address: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl HttpServerEndpoint {
    pub fn start(
        name: impl Into<String>,
        bind_address: &str,
        adapter: Arc<dyn EndpointAdapter>,
    ) -> Result<Self, WiretestError> {
        let name = name.into();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                WiretestError::dispatch(format!("failed to start http server runtime: {error}"))
            })?;
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind(bind_address))
            .map_err(|error| {
                WiretestError::dispatch(format!(
                    "failed to bind http server '{name}' on {bind_address}: {error}"
                ))
            })?;
        let address = listener.local_addr().map_err(|error| {
            WiretestError::dispatch(format!("failed to resolve http server address: {error}"))
        })?;
        let requests = DirectEndpoint::new(name);
        let state = ServerShared {
            adapter,
            requests: requests.clone(),
        };
        let router = Router::new().fallback(handle_request).with_state(state);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = std::thread::spawn(move || {
            let served = runtime.block_on(async {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown_rx.await;
                    })
                    .await
            });
            if let Err(error) = served {
                log::error!("http server stopped with error: {error}");
            }
        });
        log::info!(
            "http server endpoint '{}' listening on {address}",
            requests.name()
        );
        Ok(HttpServerEndpoint {
            requests,
            address,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Bound socket address.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Base URL clients reach this server under.
    pub fn url(&self) -> String {
        format!("http://{}/", self.address)
    }
}

impl Endpoint for HttpServerEndpoint {
    fn name(&self) -> &str {
        self.requests.name()
    }

    fn receive_timeout(&self) -> Duration {
        self.requests.receive_timeout()
    }

    fn send(&self, _message: Message, _context: &TestContext) -> Result<(), WiretestError> {
        Err(WiretestError::dispatch(format!(
            "http server endpoint '{}' cannot send directly; responses come from its adapter",
            self.requests.name()
        )))
    }

    fn receive_selected(
        &self,
        selector: &MessageSelector,
        timeout: Duration,
        context: &TestContext,
    ) -> Result<Message, WiretestError> {
        self.requests.receive_selected(selector, timeout, context)
    }
}

impl Drop for HttpServerEndpoint {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

async fn handle_request(
    State(state): State<ServerShared>,
    method: Method,
    uri: Uri,
    header_map: HeaderMap,
    body: String,
) -> Response {
    let mut request = Message::new(body)
        .with_header(HTTP_METHOD, method.as_str())
        .with_header(HTTP_REQUEST_URI, uri.path());
    for (name, value) in &header_map {
        if let Ok(value) = value.to_str() {
            request.set_header(name.as_str(), value);
        }
    }
    let context = TestContext::new();
    if let Err(error) = state.requests.send(request.clone(), &context) {
        log::warn!("failed to record inbound http request: {error}");
    }
    match state.adapter.handle(&request, &context) {
        Ok(Some(response)) => adapter_response(response),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => {
            log::warn!("endpoint adapter failed: {error}");
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
        }
    }
}

fn adapter_response(message: Message) -> Response {
    let status = message
        .header(HTTP_STATUS_CODE)
        .and_then(|value| value.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);
    let mut builder = axum::http::Response::builder().status(status);
    for (name, value) in message.headers() {
        if is_internal(name) || name.as_str() == HTTP_STATUS_CODE {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_str());
    }
    match builder.body(Body::from(message.payload().to_string())) {
        Ok(response) => response,
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to build http response: {error}"),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_response_honors_the_status_header() {
        let message = Message::new("created")
            .with_header(HTTP_STATUS_CODE, "201")
            .with_header("content-type", "text/plain");
        let response = adapter_response(message);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response
                .headers()
                .get("content-type")
                .and_then(|value| value.to_str().ok()),
            Some("text/plain")
        );
        assert!(response.headers().get(HTTP_STATUS_CODE).is_none());
    }

    #[test]
    fn adapter_response_defaults_to_ok() {
        let response = adapter_response(Message::new("fine"));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn invalid_method_header_is_a_dispatch_error() {
        let endpoint = HttpClientEndpoint::new("api", "http://127.0.0.1:1/");
        let context = TestContext::new();
        let message = Message::new("").with_header(HTTP_METHOD, "NOT A METHOD");
        let error = endpoint.send(message, &context).unwrap_err();
        assert!(error.to_string().contains("invalid http method"));
    }
}
