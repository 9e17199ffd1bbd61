//! Service endpoints — an operation plus its authorization and payload
//! contract.

use std::future::Future;
use std::pin::Pin;

use portico_protocol::{Permission, Response, ServiceStatus};
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

use crate::dispatch::CallContext;

/// Boxed future returned by a service operation.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// The payload decode step is fixed at registration time: it either yields
/// a runnable operation future or the status describing why the payload was
/// unusable.
type BoxedOperation =
    Box<dyn Fn(Option<&RawValue>) -> Result<ServiceFuture, ServiceStatus> + Send + Sync>;

/// How a service can be called — its contract. Endpoints require a logged-in
/// caller unless explicitly opened with [`allow_anonymous`](Self::allow_anonymous).
pub struct Endpoint {
    operation: BoxedOperation,
    allow_anonymous: bool,
    required_permissions: Vec<Permission>,
}

impl Endpoint {
    /// An endpoint whose operation takes no payload. Any `data` the client
    /// sends is ignored.
    pub fn new<F, Fut>(service: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self {
            operation: Box::new(move |_| Ok(Box::pin(service()))),
            allow_anonymous: false,
            required_permissions: Vec::new(),
        }
    }

    /// An endpoint whose payload is deserialized into `P` before the
    /// operation runs. A missing payload is [`ServiceStatus::EmptyPayload`];
    /// one that fails to deserialize is [`ServiceStatus::IncompatiblePayload`].
    pub fn with_payload<P, F, Fut>(service: F) -> Self
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let operation = Box::new(move |raw: Option<&RawValue>| {
            let raw = raw.ok_or(ServiceStatus::EmptyPayload)?;
            let payload: P = serde_json::from_str(raw.get())
                .map_err(|_| ServiceStatus::IncompatiblePayload)?;
            Ok(Box::pin(service(payload)) as ServiceFuture)
        });
        Self {
            operation,
            allow_anonymous: false,
            required_permissions: Vec::new(),
        }
    }

    /// Let unauthenticated callers invoke this endpoint.
    pub fn allow_anonymous(mut self) -> Self {
        self.allow_anonymous = true;
        self
    }

    /// Toggle the login requirement. The default is to require it.
    pub fn require_login(mut self, require: bool) -> Self {
        self.allow_anonymous = !require;
        self
    }

    /// Permissions the caller's authorization token must carry.
    pub fn require_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.required_permissions.extend(permissions);
        self
    }

    /// Whether the presented caller identity satisfies this endpoint's
    /// contract. Expiry is re-checked here because connections outlive the
    /// token they were opened with.
    pub(crate) fn authorizes(&self, ctx: &CallContext) -> bool {
        if self.allow_anonymous {
            return true;
        }
        let Some(auth) = &ctx.authorization else {
            return false;
        };
        if auth.is_expired() {
            return false;
        }
        self.required_permissions
            .iter()
            .all(|p| auth.has_permission(*p))
    }

    pub(crate) fn invoke(&self, raw: Option<&RawValue>) -> Result<ServiceFuture, ServiceStatus> {
        (self.operation)(raw)
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("allow_anonymous", &self.allow_anonymous)
            .field("required_permissions", &self.required_permissions)
            .finish_non_exhaustive()
    }
}
