//! HTTP JSON-RPC server
//!
//! Binds a TCP listener and serves each connection with hyper's http1
//! builder on its own tokio task.

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use json_rpc_mount::JsonRpcEndpoint;

use crate::{JsonRpcHttpHandler, Result};

/// Configuration for the HTTP JSON-RPC server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Path the endpoint is mounted on
    pub rpc_path: String,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum request body size
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            rpc_path: "/rpc".to_string(),
            enable_cors: true,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Builder for [`HttpJsonRpcServer`]
pub struct HttpJsonRpcServerBuilder<C> {
    config: ServerConfig,
    endpoint: Arc<JsonRpcEndpoint<C>>,
}

impl<C> HttpJsonRpcServerBuilder<C>
where
    C: Send + Sync + 'static,
{
    pub fn new(endpoint: JsonRpcEndpoint<C>) -> Self {
        Self::with_shared_endpoint(Arc::new(endpoint))
    }

    pub fn with_shared_endpoint(endpoint: Arc<JsonRpcEndpoint<C>>) -> Self {
        Self {
            config: ServerConfig::default(),
            endpoint,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the bind address
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    /// Set the path the endpoint is mounted on
    pub fn rpc_path(mut self, path: impl Into<String>) -> Self {
        self.config.rpc_path = path.into();
        self
    }

    /// Enable or disable CORS
    pub fn cors(mut self, enable: bool) -> Self {
        self.config.enable_cors = enable;
        self
    }

    /// Set maximum request body size
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    pub fn build(self) -> HttpJsonRpcServer<C> {
        let handler = JsonRpcHttpHandler::new(Arc::new(self.config.clone()), self.endpoint);
        HttpJsonRpcServer {
            config: self.config,
            handler,
        }
    }
}

/// HTTP server exposing one JSON-RPC endpoint
pub struct HttpJsonRpcServer<C> {
    config: ServerConfig,
    handler: JsonRpcHttpHandler<C>,
}

impl<C> Clone for HttpJsonRpcServer<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<C> HttpJsonRpcServer<C>
where
    C: Send + Sync + 'static,
{
    pub fn builder(endpoint: JsonRpcEndpoint<C>) -> HttpJsonRpcServerBuilder<C> {
        HttpJsonRpcServerBuilder::new(endpoint)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &Arc<JsonRpcEndpoint<C>> {
        &self.handler.endpoint
    }

    /// Request handler, for embedding the mount in another hyper service
    pub fn handler(&self) -> &JsonRpcHttpHandler<C> {
        &self.handler
    }

    /// Bind `bind_address` and serve connections
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_address).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!("HTTP JSON-RPC server listening on {}", local_addr);
        info!("JSON-RPC endpoint available at: {}", self.config.rpc_path);

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) if is_connection_error(&err) => {
                    debug!("Connection dropped before accept: {}", err);
                    continue;
                }
                Err(err) => {
                    // Back off on resource errors such as EMFILE
                    warn!("Failed to accept connection: {}", err);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    continue;
                }
            };
            debug!("New connection from {}", peer_addr);

            let handler = self.handler.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req: Request<Incoming>| {
                    let handler = handler.clone();
                    async move { Ok::<_, Infallible>(handler.handle_request(req, Some(peer_addr)).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    if err.is_incomplete_message() {
                        debug!("Client disconnected (normal): {}", err);
                    } else {
                        error!("Error serving connection: {}", err);
                    }
                }
            });
        }
    }
}

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Errors that concern only the connection being accepted
fn is_connection_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.rpc_path, "/rpc");
        assert!(config.enable_cors);
        assert_eq!(config.max_body_size, 1024 * 1024);
    }

    #[test]
    fn test_builder() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 3000);
        let server = HttpJsonRpcServer::builder(JsonRpcEndpoint::new(()))
            .bind_address(addr)
            .rpc_path("/api/rpc")
            .cors(false)
            .max_body_size(2048)
            .build();

        assert_eq!(server.config().bind_address, addr);
        assert_eq!(server.config().rpc_path, "/api/rpc");
        assert!(!server.config().enable_cors);
        assert_eq!(server.handler().config.max_body_size, 2048);
    }

    #[test]
    fn test_accept_error_classification() {
        for kind in [
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionRefused,
        ] {
            assert!(is_connection_error(&io::Error::from(kind)));
        }
        // EMFILE
        assert!(!is_connection_error(&io::Error::from_raw_os_error(24)));
        assert!(!is_connection_error(&io::Error::other("accept failed")));
    }

    #[tokio::test]
    async fn test_serve_outlives_dropped_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = HttpJsonRpcServer::builder(JsonRpcEndpoint::new(())).build();
        let serving = tokio::spawn(async move { server.serve(listener).await });

        for _ in 0..3 {
            let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            drop(stream);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!serving.is_finished());
        assert!(tokio::net::TcpStream::connect(addr).await.is_ok());
        serving.abort();
    }
}
