//! JSON request/response shapes of the lock server protocol.

use lockgate_core::{LockHandle, SerializableError};
use lockgate_distributed::AcquireParams;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireRequest {
    #[serde(rename = "lockName")]
    pub lock_name: String,
    #[serde(default)]
    pub opts: AcquireParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireResponse {
    /// The issued handle; the zero handle when `err` is set.
    #[serde(rename = "lockHandle", default)]
    pub lock_handle: LockHandle,
    #[serde(default)]
    pub err: SerializableError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewLeaseRequest {
    #[serde(rename = "lockHandle")]
    pub lock_handle: LockHandle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewLeaseResponse {
    #[serde(default)]
    pub err: SerializableError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRequest {
    #[serde(rename = "lockHandle")]
    pub lock_handle: LockHandle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseResponse {
    #[serde(default)]
    pub err: SerializableError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_request_wire_shape() {
        let request = AcquireRequest {
            lock_name: "deploy".to_string(),
            opts: AcquireParams {
                shared: true,
                acquirer_id: "ci-1".to_string(),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "lockName": "deploy",
                "opts": {"shared": true, "acquirerId": "ci-1"},
            })
        );
    }

    #[test]
    fn acquire_response_defaults_to_zero_handle() {
        let response: AcquireResponse =
            serde_json::from_str(r#"{"err": "should wait"}"#).unwrap();
        assert_eq!(response.lock_handle, LockHandle::default());
        assert!(response.err.into_error().unwrap().is_should_wait());
    }
}
