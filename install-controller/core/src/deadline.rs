use crate::{Error, Result};
use std::future::Future;
use tokio::time::{self, Instant};

/// Drives `fut` to completion unless `deadline` passes first, in which case
/// the call fails with [`Error::Timeout`].
pub async fn within<T, F>(deadline: Instant, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match time::timeout_at(deadline, fut).await {
        Ok(res) => res,
        Err(_elapsed) => Err(Error::Timeout),
    }
}
