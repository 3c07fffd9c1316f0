//! Error taxonomy for the preload and monitor paths.
//!
//! Only [`SyncError::SectionsUnavailable`] is ever surfaced to the user (as
//! the orchestrator's ready message). Everything else is recovered locally and
//! only affects how complete the cache is.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The section list could not be fetched. Fatal to the full pipeline.
    #[error("library sections unavailable: {0}")]
    SectionsUnavailable(String),

    /// The fast path saw zero sections and refuses to trust the cache.
    #[error("no library sections returned")]
    EmptyLibrary,

    /// A single upstream call exceeded its deadline.
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// A single upstream call failed.
    #[error("{operation} failed: {source}")]
    Upstream {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl SyncError {
    pub fn upstream(operation: &'static str, source: anyhow::Error) -> Self {
        SyncError::Upstream { operation, source }
    }
}

/// Run `fut` under a deadline, mapping both failure modes into [`SyncError`].
pub async fn with_timeout<T, F>(operation: &'static str, after: Duration, fut: F) -> Result<T, SyncError>
where
    F: std::future::Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(SyncError::upstream(operation, e)),
        Err(_) => Err(SyncError::Timeout { operation, after }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timeout_is_reported() {
        let result: Result<(), SyncError> = with_timeout("metadata", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, SyncError::Timeout { operation: "metadata", .. }));
    }

    #[tokio::test]
    async fn upstream_error_is_wrapped() {
        let result: Result<(), SyncError> = with_timeout("poster", Duration::from_secs(1), async {
            anyhow::bail!("404")
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "poster failed: 404");
    }
}
