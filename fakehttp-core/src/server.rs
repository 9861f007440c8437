//! HTTP transport: tokio + hyper HTTP/1.1 in front of a [`Handler`].
//!
//! Each request body is read in full, the handler runs against a
//! [`Recorder`], and the recording becomes the hyper response.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response as HyperResponse, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::handler::Handler;
use crate::writer::Recorder;

/// In-process server on an ephemeral localhost port. Stops when dropped.
///
/// Must be started from inside a tokio runtime.
#[derive(Debug)]
pub struct TestServer {
    addr: SocketAddr,
    join_handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start<H: Handler + 'static>(handler: H) -> std::io::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;
        let handler: Arc<dyn Handler> = Arc::new(handler);
        let join_handle = tokio::spawn(serve(listener, handler, std::future::pending::<()>()));
        tracing::debug!(%addr, "test server listening");
        Ok(Self { addr, join_handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://127.0.0.1:<port>` followed by `path_and_query`.
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.join_handle.abort();
    }
}

/// Accept connections until `shutdown` resolves, one task per connection.
pub async fn serve<F>(listener: TcpListener, handler: Arc<dyn Handler>, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accept_result = listener.accept() => {
                let (stream, peer) = match accept_result {
                    Ok(x) => x,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept error");
                        continue;
                    }
                };
                let io = TokioIo::new(stream);
                let handler = Arc::clone(&handler);
                tokio::task::spawn(async move {
                    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                        let handler = Arc::clone(&handler);
                        async move { dispatch(handler, req).await }
                    });
                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        tracing::debug!(%peer, error = %e, "serve_connection error");
                    }
                });
            }
        }
    }
}

async fn dispatch(
    handler: Arc<dyn Handler>,
    req: Request<hyper::body::Incoming>,
) -> Result<HyperResponse<Full<Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read request body");
            let mut res = HyperResponse::new(Full::new(Bytes::from(e.to_string())));
            *res.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(res);
        }
    };
    let req = Request::from_parts(parts, body);

    let mut recorder = Recorder::new();
    handler.serve_http(&mut recorder, &req);
    tracing::debug!(
        method = %req.method(),
        path = req.uri().path(),
        status = recorder.status(),
        "request served"
    );
    Ok(recorder.into_response().map(Full::new))
}

/// Serve `handler` on `host:port` until Ctrl-C (blocks).
pub fn run<H: Handler + 'static>(
    handler: H,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", host, port);
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(async move {
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "fakehttp listening");
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "ctrl-c handler failed");
            }
        };
        serve(listener, Arc::new(handler), shutdown).await;
        tracing::info!("fakehttp stopped");
        Ok(())
    })
}
