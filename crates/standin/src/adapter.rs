//! HTTP serving adapter.
//!
//! Binds the engine to a real socket: each accepted connection is served by
//! hyper's http1 stack and every request is translated into an
//! `EngineRequest`, dispatched, and the resulting `ResponseDescriptor`
//! rendered back as a wire response.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::engine::{Engine, EngineRequest, ResponseDescriptor};

/// HTTP server fronting one engine instance.
pub struct MockServer {
    addr: SocketAddr,
    engine: Arc<Engine>,
}

impl MockServer {
    pub fn new(addr: SocketAddr, engine: Arc<Engine>) -> Self {
        Self { addr, engine }
    }

    /// Accept loop. Runs until the task is dropped.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("mock backend listening on http://{}", self.addr);

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let engine = Arc::clone(&self.engine);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let engine = Arc::clone(&engine);
                    async move { serve_request(req, engine).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("connection error: {}", e);
                }
            });
        }
    }
}

async fn serve_request(
    req: Request<Incoming>,
    engine: Arc<Engine>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let url = match req.uri().path_and_query() {
        // Present the engine with the path relative to the server root.
        Some(pq) => pq.as_str().trim_start_matches('/').to_string(),
        None => req.uri().to_string(),
    };
    let headers = req.headers().clone();

    debug!("{} {}", method, url);

    let bytes = req.into_body().collect().await?.to_bytes();
    let body = if bytes.is_empty() {
        None
    } else {
        // A non-JSON body is treated as absent rather than failing the call.
        serde_json::from_slice::<Value>(&bytes).ok()
    };

    let mut request = EngineRequest::new(method, url);
    request.headers = headers;
    request.body = body;

    Ok(render(engine.handle(request).await))
}

/// Render an engine response description onto the wire.
fn render(desc: ResponseDescriptor) -> Response<Full<Bytes>> {
    let bytes = match &desc.body {
        Some(body) => serde_json::to_vec(body).unwrap_or_default(),
        None => Vec::new(),
    };

    let mut builder = Response::builder().status(desc.status);
    if let Some(headers) = builder.headers_mut() {
        headers.extend(desc.headers.clone());
        if bytes.is_empty() {
            headers.remove(hyper::header::CONTENT_TYPE);
        }
        if let Ok(len) = HeaderValue::from_str(&bytes.len().to_string()) {
            headers.insert(hyper::header::CONTENT_LENGTH, len);
        }
    }

    builder.body(Full::new(Bytes::from(bytes))).unwrap_or_else(|_| {
        Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::new(Bytes::new()))
            .unwrap_or_default()
    })
}
