use std::future::Future;
use std::time::Duration;

use crate::orchestrator::error::EngineError;
use crate::runtime::error::RuntimeError;

/// What we know about a daemon call once it returned or ran out of time.
#[derive(Debug)]
pub(crate) enum CallOutcome<T> {
    Confirmed(T),
    Failed(RuntimeError),
    /// Timed out or lost the connection; the daemon may have applied it.
    Uncertain(RuntimeError),
}

impl<T> CallOutcome<T> {
    pub(crate) fn into_result(self) -> Result<T, EngineError> {
        match self {
            CallOutcome::Confirmed(value) => Ok(value),
            CallOutcome::Failed(err) => Err(EngineError::Runtime(err)),
            CallOutcome::Uncertain(err) => Err(EngineError::Timeout(err)),
        }
    }
}

pub(crate) async fn bounded<T, F>(deadline: Duration, operation: &str, call: F) -> CallOutcome<T>
where
    F: Future<Output = Result<T, RuntimeError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(Ok(value)) => CallOutcome::Confirmed(value),
        Ok(Err(err)) if err.is_uncertain() => {
            warn!("Runtime {} outcome unknown: {}", operation, err);
            CallOutcome::Uncertain(err)
        }
        Ok(Err(err)) => {
            debug!("Runtime {} failed: {}", operation, err);
            CallOutcome::Failed(err)
        }
        Err(_) => {
            warn!("Runtime {} exceeded its {:?} deadline", operation, deadline);
            CallOutcome::Uncertain(RuntimeError::Timeout(deadline))
        }
    }
}
