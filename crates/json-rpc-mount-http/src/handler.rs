//! HTTP request handler mounting a JSON-RPC endpoint on one path

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body::Body;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::header::{ALLOW, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use hyper::{Method, Request, Response, StatusCode};
use tracing::{debug, error, warn};

use json_rpc_mount::{JsonRpcEndpoint, JsonRpcError, JsonRpcMessage, RequestContext, parse_body};

use crate::{CorsLayer, ServerConfig};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Translates HTTP requests into endpoint calls.
///
/// Cheap to clone; one instance is shared by every connection of a server.
pub struct JsonRpcHttpHandler<C> {
    pub(crate) config: Arc<ServerConfig>,
    pub(crate) endpoint: Arc<JsonRpcEndpoint<C>>,
}

impl<C> Clone for JsonRpcHttpHandler<C> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            endpoint: Arc::clone(&self.endpoint),
        }
    }
}

impl<C> JsonRpcHttpHandler<C>
where
    C: Send + Sync + 'static,
{
    pub fn new(config: Arc<ServerConfig>, endpoint: Arc<JsonRpcEndpoint<C>>) -> Self {
        Self { config, endpoint }
    }

    /// Handle one HTTP request. Never fails: every outcome is a response.
    pub async fn handle_request<B>(
        &self,
        req: Request<B>,
        peer_addr: Option<SocketAddr>,
    ) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        debug!("Handling {} {}", req.method(), req.uri().path());

        let mut response = if req.uri().path() != self.config.rpc_path {
            text_response(StatusCode::NOT_FOUND, "Not Found")
        } else {
            let method = req.method().clone();
            match method {
                Method::POST => self.handle_json_rpc_request(req, peer_addr).await,
                Method::OPTIONS if self.config.enable_cors => {
                    empty_response(StatusCode::NO_CONTENT)
                }
                _ => self.method_not_allowed(),
            }
        };

        if self.config.enable_cors {
            CorsLayer::apply_cors_headers(response.headers_mut());
        }
        response
    }

    async fn handle_json_rpc_request<B>(
        &self,
        req: Request<B>,
        peer_addr: Option<SocketAddr>,
    ) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !content_type.starts_with("application/json") {
            warn!("Invalid content type: {}", content_type);
            return text_response(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Content-Type must be application/json",
            );
        }

        let declared_length = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|len| len.to_str().ok())
            .and_then(|len| len.parse::<usize>().ok());
        if declared_length.is_some_and(|len| len > self.config.max_body_size) {
            warn!("Request body too large: {:?} bytes", declared_length);
            return text_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }

        let (parts, body) = req.into_parts();
        let request_ctx = request_context(&parts, peer_addr);

        let body_bytes = match Limited::new(body, self.config.max_body_size).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                warn!("Request body exceeded {} bytes", self.config.max_body_size);
                return text_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
            }
            Err(err) => {
                error!("Failed to read request body: {}", err);
                return text_response(StatusCode::BAD_REQUEST, "Failed to read request body");
            }
        };

        let message = match parse_body(&body_bytes) {
            Ok(body) => self.endpoint.handle_value(request_ctx, body).await,
            Err(err) => {
                warn!("JSON-RPC parse error: {}", err);
                JsonRpcMessage::error(JsonRpcError::parse_error())
            }
        };

        match message.to_json_string() {
            Ok(response_json) => {
                debug!("Sending JSON-RPC response");
                json_response(response_json)
            }
            Err(err) => {
                error!("Failed to serialize JSON-RPC response: {}", err);
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }

    fn method_not_allowed(&self) -> Response<Full<Bytes>> {
        let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        let allow = if self.config.enable_cors {
            "POST, OPTIONS"
        } else {
            "POST"
        };
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static(allow));
        response
    }
}

/// Transport view of the request handed to handlers
fn request_context(
    parts: &http::request::Parts,
    peer_addr: Option<SocketAddr>,
) -> RequestContext {
    let mut ctx = RequestContext::new()
        .with_method(parts.method.as_str())
        .with_path(parts.uri.path());
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            ctx = ctx.with_header(name.as_str(), value);
        }
    }
    if let Some(addr) = peer_addr {
        ctx = ctx.with_peer_addr(addr);
    }
    ctx
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

fn json_response(body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
