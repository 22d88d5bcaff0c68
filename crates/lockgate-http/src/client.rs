//! Client-side backend speaking the lock server protocol.

use lockgate_core::{LockError, LockHandle, LockResult};
use lockgate_distributed::{AcquireParams, DistributedLockerBackend};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::wire::{
    AcquireRequest, AcquireResponse, ReleaseRequest, ReleaseResponse, RenewLeaseRequest,
    RenewLeaseResponse,
};

/// [`DistributedLockerBackend`] that forwards every operation to a remote
/// lock server.
///
/// Error strings in responses are classified back into typed errors by
/// their canonical texts, so `ShouldWait` and the lease-loss classes
/// behave exactly as with a local backend, including driving the
/// client-side renewal worker.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Creates a backend for a server at `endpoint`
    /// (e.g. `http://locks.internal:55589`).
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post<Request, Response>(&self, path: &str, request: &Request) -> LockResult<Response>
    where
        Request: Serialize,
        Response: DeserializeOwned,
    {
        let url = format!("{}/{}", self.endpoint, path);
        debug!(%url, "post");
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|err| LockError::Transport(Box::new(err)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LockError::Transport(
                format!("lock server answered {status} on {url}").into(),
            ));
        }
        response
            .json()
            .await
            .map_err(|err| LockError::Transport(Box::new(err)))
    }
}

impl DistributedLockerBackend for HttpBackend {
    async fn acquire(&self, lock_name: &str, params: AcquireParams) -> LockResult<LockHandle> {
        let request = AcquireRequest {
            lock_name: lock_name.to_string(),
            opts: params,
        };
        let response: AcquireResponse = self.post("acquire", &request).await?;
        match response.err.into_error() {
            Some(err) => Err(err),
            None => Ok(response.lock_handle),
        }
    }

    async fn renew_lease(&self, handle: &LockHandle) -> LockResult<()> {
        let request = RenewLeaseRequest {
            lock_handle: handle.clone(),
        };
        let response: RenewLeaseResponse = self.post("renew-lease", &request).await?;
        match response.err.into_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn release(&self, handle: &LockHandle) -> LockResult<()> {
        let request = ReleaseRequest {
            lock_handle: handle.clone(),
        };
        let response: ReleaseResponse = self.post("release", &request).await?;
        match response.err.into_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
