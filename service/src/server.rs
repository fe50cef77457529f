use crate::repository::AssetRepository;
use crate::router::router;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Clone)]
pub struct TokioExecutor;

impl<F> hyper::rt::Executor<F> for TokioExecutor
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    fn execute(&self, fut: F) {
        tokio::task::spawn(fut);
    }
}

/// Accepts connections until `shutdown` resolves. Each connection gets its own
/// task and speaks HTTP/1.1 or HTTP/2, whichever the client opens with.
pub async fn serve<R, F>(listener: TcpListener, repository: Arc<R>, shutdown: F)
where
    R: AssetRepository,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let (stream, remote) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept connection: {e}");
                    continue;
                }
            },
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                return;
            }
        };

        let io = TokioIo::new(stream);
        let repository = repository.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| router(req, repository.clone()));
            if let Err(err) = auto::Builder::new(TokioExecutor)
                .serve_connection(io, service)
                .await
            {
                warn!("Error serving connection from {remote}: {err:?}");
            }
        });
    }
}
