//! HTTP server exposing a distributed lock backend.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Json, State};
use axum::routing::post;
use axum::Router;
use lockgate_core::{LockHandle, SerializableError};
use lockgate_distributed::DistributedLockerBackend;
use tracing::{debug, info};

use crate::wire::{
    AcquireRequest, AcquireResponse, ReleaseRequest, ReleaseResponse, RenewLeaseRequest,
    RenewLeaseResponse,
};

/// Builds the router serving the lock protocol on `/acquire`,
/// `/renew-lease` and `/release`.
///
/// Handlers always answer `200 OK` with the operation's error folded into
/// the response's `err` string; transport-level failures are the only
/// non-2xx answers a client will see. The server holds no lock state of
/// its own and never runs lease renewal; that stays with the clients.
pub fn backend_router<B>(backend: Arc<B>) -> Router
where
    B: DistributedLockerBackend + 'static,
{
    Router::new()
        .route("/acquire", post(handle_acquire::<B>))
        .route("/renew-lease", post(handle_renew_lease::<B>))
        .route("/release", post(handle_release::<B>))
        .with_state(backend)
}

/// Binds `addr` and serves [`backend_router`] until the task is dropped.
pub async fn run_backend_server<B>(addr: SocketAddr, backend: Arc<B>) -> std::io::Result<()>
where
    B: DistributedLockerBackend + 'static,
{
    lockgate_core::debug::init_debug_tracing();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "lock server listening");
    axum::serve(listener, backend_router(backend)).await
}

async fn handle_acquire<B: DistributedLockerBackend>(
    State(backend): State<Arc<B>>,
    Json(request): Json<AcquireRequest>,
) -> Json<AcquireResponse> {
    debug!(lock_name = %request.lock_name, opts = ?request.opts, "acquire");
    let response = match backend.acquire(&request.lock_name, request.opts).await {
        Ok(lock_handle) => AcquireResponse {
            lock_handle,
            err: SerializableError::none(),
        },
        Err(err) => AcquireResponse {
            lock_handle: LockHandle::default(),
            err: (&err).into(),
        },
    };
    Json(response)
}

async fn handle_renew_lease<B: DistributedLockerBackend>(
    State(backend): State<Arc<B>>,
    Json(request): Json<RenewLeaseRequest>,
) -> Json<RenewLeaseResponse> {
    debug!(lock_name = %request.lock_handle.lock_name, id = %request.lock_handle.id, "renew lease");
    let result = backend.renew_lease(&request.lock_handle).await;
    Json(RenewLeaseResponse {
        err: (&result).into(),
    })
}

async fn handle_release<B: DistributedLockerBackend>(
    State(backend): State<Arc<B>>,
    Json(request): Json<ReleaseRequest>,
) -> Json<ReleaseResponse> {
    debug!(lock_name = %request.lock_handle.lock_name, id = %request.lock_handle.id, "release");
    let result = backend.release(&request.lock_handle).await;
    Json(ReleaseResponse {
        err: (&result).into(),
    })
}
