//! The dispatcher — translates one inbound envelope into one outbound
//! envelope using the registered service map.

use portico_protocol::{RawRequest, Response, ServiceStatus};
use portico_token::AuthorizationToken;
use tracing::{debug, warn};

use crate::registry::ServiceMap;

/// Per-call identity, established by the transport when the connection was
/// accepted. `None` means the caller never presented a valid authorization
/// token.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub authorization: Option<AuthorizationToken>,
}

impl CallContext {
    pub fn authorized(authorization: AuthorizationToken) -> Self {
        Self {
            authorization: Some(authorization),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Routes inbound envelopes to registered endpoints. Never raises a
/// transport-level failure — every completed dispatch yields exactly one
/// well-formed outbound envelope.
pub struct Dispatcher {
    services: ServiceMap,
}

impl Dispatcher {
    pub fn new(services: ServiceMap) -> Self {
        Self { services }
    }

    /// Process one raw inbound envelope and produce the response bytes.
    ///
    /// The client's request id is echoed back on every path, including
    /// errors, so asynchronous responses stay correlatable. A request whose
    /// outer envelope cannot be parsed has no usable id and is answered
    /// with an empty one.
    pub async fn dispatch(&self, raw: &[u8], ctx: &CallContext) -> Vec<u8> {
        let (mut response, request_id) = match serde_json::from_slice::<RawRequest>(raw) {
            Err(err) => {
                debug!(%err, "unparseable request envelope");
                (Response::error(ServiceStatus::UnableToParseRequest), String::new())
            }
            Ok(request) => {
                let response = self.route(&request, ctx).await;
                (response, request.request_id)
            }
        };

        response.request_id = request_id;
        response.to_bytes()
    }

    async fn route(&self, request: &RawRequest, ctx: &CallContext) -> Response {
        let Some(endpoint) = self.services.get(request.service_id) else {
            debug!(service = request.service_id, "unknown service id");
            return Response::error(ServiceStatus::InvalidService);
        };

        if !endpoint.authorizes(ctx) {
            warn!(service = request.service_id, "unauthorized service call");
            return Response::error(ServiceStatus::NoWebSocketClient);
        }

        match endpoint.invoke(request.payload.as_deref()) {
            Ok(operation) => operation.await,
            Err(status) => {
                debug!(service = request.service_id, status = status.code(), "payload rejected");
                Response::error(status)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;
    use portico_protocol::Permission;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Deserialize)]
    struct SumPayload {
        a: i64,
        b: i64,
    }

    fn echo_sum_map() -> ServiceMap {
        let mut map = ServiceMap::new();
        map.register(
            1,
            Endpoint::with_payload(|p: SumPayload| async move { Response::success(p.a + p.b) })
                .allow_anonymous(),
        )
        .unwrap();
        map.register(
            2,
            Endpoint::new(|| async { Response::error(ServiceStatus::DatabaseError) })
                .allow_anonymous(),
        )
        .unwrap();
        map.register(
            3,
            Endpoint::new(|| async { Response::success("secret") })
                .require_permissions([Permission(4)]),
        )
        .unwrap();
        map
    }

    async fn respond(raw: &str, ctx: &CallContext) -> Response {
        let dispatcher = Dispatcher::new(echo_sum_map());
        let bytes = dispatcher.dispatch(raw.as_bytes(), ctx).await;
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn matched_endpoint_runs() {
        let res = respond(
            r#"{"type":1,"id":"r1","data":{"a":1,"b":2}}"#,
            &CallContext::anonymous(),
        )
        .await;
        assert_eq!(res.status_id, ServiceStatus::Okay);
        assert_eq!(res.request_id, "r1");
        assert_eq!(res.payload, Some(serde_json::json!(3)));
    }

    #[tokio::test]
    async fn service_error_status_passes_through() {
        let res = respond(r#"{"type":2,"id":"r2","data":null}"#, &CallContext::anonymous()).await;
        assert_eq!(res.status_id, ServiceStatus::DatabaseError);
        assert_eq!(res.request_id, "r2");
    }

    #[tokio::test]
    async fn unknown_service_rejected() {
        let res = respond(r#"{"type":999,"id":"r3","data":null}"#, &CallContext::anonymous()).await;
        assert_eq!(res.status_id, ServiceStatus::InvalidService);
        assert_eq!(res.request_id, "r3");
    }

    #[tokio::test]
    async fn bad_payload_still_echoes_id() {
        let res = respond(r#"{"type":1,"id":"refID","data":""}"#, &CallContext::anonymous()).await;
        assert_eq!(res.status_id, ServiceStatus::IncompatiblePayload);
        assert_eq!(res.request_id, "refID");
    }

    #[tokio::test]
    async fn missing_payload_is_empty() {
        let res = respond(r#"{"type":1,"id":"r4"}"#, &CallContext::anonymous()).await;
        assert_eq!(res.status_id, ServiceStatus::EmptyPayload);
    }

    #[tokio::test]
    async fn unparseable_envelope_has_empty_id() {
        let res = respond("not json at all", &CallContext::anonymous()).await;
        assert_eq!(res.status_id, ServiceStatus::UnableToParseRequest);
        assert_eq!(res.request_id, "");
    }

    #[tokio::test]
    async fn anonymous_caller_rejected_from_protected_endpoint() {
        let res = respond(r#"{"type":3,"id":"r5","data":null}"#, &CallContext::anonymous()).await;
        assert_eq!(res.status_id, ServiceStatus::NoWebSocketClient);
        assert_eq!(res.request_id, "r5");
    }

    #[tokio::test]
    async fn authorized_caller_passes_permission_check() {
        use portico_token::AuthorizationToken;

        let ctx = CallContext::authorized(AuthorizationToken::new(1, vec![4, 9]));
        let res = respond(r#"{"type":3,"id":"r6","data":null}"#, &ctx).await;
        assert_eq!(res.status_id, ServiceStatus::Okay);
    }

    #[tokio::test]
    async fn missing_permission_rejected() {
        use portico_token::AuthorizationToken;

        let ctx = CallContext::authorized(AuthorizationToken::new(1, vec![9]));
        let res = respond(r#"{"type":3,"id":"r7","data":null}"#, &ctx).await;
        assert_eq!(res.status_id, ServiceStatus::NoWebSocketClient);
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("unrepresentable"))
        }
    }

    #[tokio::test]
    async fn unmarshalable_response_degrades_to_fallback() {
        let mut map = ServiceMap::new();
        map.register(
            1,
            Endpoint::new(|| async { Response::success(Unserializable) }).allow_anonymous(),
        )
        .unwrap();

        let dispatcher = Dispatcher::new(map);
        let bytes = dispatcher
            .dispatch(br#"{"type":1,"id":"r8"}"#, &CallContext::anonymous())
            .await;
        assert_eq!(bytes, br#"{"status":5,"id":"r8","data":null}"#.to_vec());
    }
}
