use crate::Transport;
use olm_install_controller_core::{within, Error, Result};
use olm_install_controller_k8s_api::{Resource, ResourceExt};
use std::sync::Arc;
use tokio::time::Instant;

/// Applies objects of kind `K` through a [`Transport`].
///
/// The client holds no mutable state and may be cloned freely.
pub struct ApplyClient<K> {
    transport: Arc<dyn Transport<K>>,
}

// === impl ApplyClient ===

impl<K> Clone for ApplyClient<K> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
        }
    }
}

impl<K> std::fmt::Debug for ApplyClient<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplyClient").finish_non_exhaustive()
    }
}

impl<K> ApplyClient<K>
where
    K: Resource + Send + Sync + 'static,
{
    pub fn new(transport: impl Transport<K> + 'static) -> Self {
        Self::from_shared(Arc::new(transport))
    }

    pub fn from_shared(transport: Arc<dyn Transport<K>>) -> Self {
        Self { transport }
    }

    /// Creates `obj`, replacing any existing object with the same identity.
    ///
    /// Replacement deletes the existing object and then creates `obj`. The two steps are not
    /// atomic: if the second create fails the object is left absent, and the error is wrapped as
    /// an update failure. A failed delete is returned as-is and leaves the existing object in
    /// place.
    pub async fn apply(&self, obj: &K, deadline: Instant) -> Result<()> {
        match within(deadline, self.transport.create(obj)).await {
            Ok(()) => return Ok(()),
            Err(error) if error.is_already_exists() => {}
            Err(error) => return Err(error),
        }

        tracing::debug!(
            namespace = ?obj.namespace(),
            name = %obj.name_any(),
            "Replacing existing object",
        );
        within(deadline, self.transport.delete(obj)).await?;
        within(deadline, self.transport.create(obj))
            .await
            .map_err(Error::update)
    }

    /// Updates `obj` in place, without checking whether it exists.
    pub async fn replace(&self, obj: &K, deadline: Instant) -> Result<()> {
        within(deadline, self.transport.update(obj))
            .await
            .map_err(Error::update)
    }
}
