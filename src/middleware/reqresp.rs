//! Request/response service middleware (spec §4.9 `ReqResp`): exactly one
//! handler per service name, re-registration replaces, calls with no handler
//! fail with `NoService`, handler failure propagates as `ServiceError`.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::error::{BtError, BtResult};
use crate::events::Payload;
use crate::middleware::Middleware;

pub type ReqHandler = Arc<dyn Fn(Payload) -> BoxFuture<'static, anyhow::Result<Payload>> + Send + Sync>;

pub struct ReqResp {
    name: String,
    handlers: RwLock<HashMap<String, ReqHandler>>,
}

impl ReqResp {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Installs `handler` for `service`. A second registration under the
    /// same name silently replaces the first.
    pub async fn register(&self, service: impl Into<String>, handler: ReqHandler) {
        self.handlers.write().await.insert(service.into(), handler);
    }

    pub async fn unregister(&self, service: &str) {
        self.handlers.write().await.remove(service);
    }

    /// Awaits the registered handler. `timeout` surfaces as
    /// [`BtError::Timeout`] if the handler does not complete in time.
    pub async fn call(&self, service: &str, request: Payload, timeout: Option<Duration>) -> BtResult<Payload> {
        let handler = self
            .handlers
            .read()
            .await
            .get(service)
            .cloned()
            .ok_or_else(|| BtError::NoService(service.to_string()))?;

        let call_future = handler(request);
        match timeout {
            Some(duration) => tokio::time::timeout(duration, call_future)
                .await
                .map_err(|_| BtError::Timeout)?
                .map_err(|err| BtError::ServiceError(err.to_string())),
            None => call_future.await.map_err(|err| BtError::ServiceError(err.to_string())),
        }
    }
}

impl Middleware for ReqResp {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
