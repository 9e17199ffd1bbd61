//! Built-in system services.
//!
//! Business modules register their own service map fragments; this fragment
//! only provides the endpoints every deployment wants regardless of which
//! modules are loaded.

use chrono::{DateTime, Utc};
use portico_protocol::{Response, ServiceId};
use portico_server::{Endpoint, RegistryError, ServiceMap};
use serde::Serialize;
use serde_json::Value;

pub const STATUS: ServiceId = 1;
pub const ECHO: ServiceId = 2;

#[derive(Serialize)]
struct ServerStatus {
    version: &'static str,
    #[serde(rename = "startedAt")]
    started_at: DateTime<Utc>,
}

/// The system service fragment, merged into the amalgamated map at startup.
pub fn services() -> Result<ServiceMap, RegistryError> {
    let started_at = Utc::now();

    let mut map = ServiceMap::new();
    map.register(
        STATUS,
        Endpoint::new(move || {
            let status = ServerStatus {
                version: env!("CARGO_PKG_VERSION"),
                started_at,
            };
            async move { Response::success(status) }
        })
        .allow_anonymous(),
    )?;
    map.register(
        ECHO,
        Endpoint::with_payload(|payload: Value| async move { Response::success(payload) })
            .allow_anonymous(),
    )?;
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_server::{CallContext, Dispatcher};
    use portico_protocol::ServiceStatus;

    #[tokio::test]
    async fn echo_returns_payload_verbatim() {
        let dispatcher = Dispatcher::new(services().unwrap());
        let bytes = dispatcher
            .dispatch(
                br#"{"type":2,"id":"e1","data":{"nested":[1,2,3]}}"#,
                &CallContext::anonymous(),
            )
            .await;
        let res: Response = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(res.status_id, ServiceStatus::Okay);
        assert_eq!(res.payload, Some(serde_json::json!({"nested":[1,2,3]})));
    }

    #[tokio::test]
    async fn status_reports_version() {
        let dispatcher = Dispatcher::new(services().unwrap());
        let bytes = dispatcher
            .dispatch(br#"{"type":1,"id":"s1"}"#, &CallContext::anonymous())
            .await;
        let res: Response = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(res.status_id, ServiceStatus::Okay);
        let payload = res.payload.unwrap();
        assert_eq!(payload["version"], env!("CARGO_PKG_VERSION"));
        assert!(payload["startedAt"].is_string());
    }
}
