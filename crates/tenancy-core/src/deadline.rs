//! Per-call deadline for datastore access.

use std::future::Future;
use std::time::Duration;

use tenancy_store::StoreResult;
use tenancy_types::ResourceKind;

use crate::error::{CoreError, CoreResult};

/// Run one store call under `limit`, classifying its error.
///
/// Exceeding the deadline is reported as [`CoreError::Internal`] and the
/// call's future is dropped. Dropping only stops local work: a remote store
/// may already have received the request and can still apply the write, so
/// a timed-out write has an unknown outcome. Callers re-read before retrying.
pub(crate) async fn within<T, F>(
    limit: Duration,
    kind: ResourceKind,
    action: &str,
    call: F,
) -> CoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(CoreError::from),
        Err(_) => {
            tracing::warn!(kind = %kind, action, timeout_ms = limit.as_millis() as u64, "store call timed out");
            Err(CoreError::Internal(format!(
                "{action} {} timed out after {}ms",
                kind.display_name(),
                limit.as_millis()
            )))
        }
    }
}
