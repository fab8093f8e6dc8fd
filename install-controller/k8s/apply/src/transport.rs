use olm_install_controller_core::{Error, Result, INSTALL_CONTROLLER_NAME};
use olm_install_controller_k8s_api::{
    self as k8s, Api, DeleteParams, ErrorResponse, NamespaceResourceScope, Patch, PatchParams,
    PostParams, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

/// Issues single writes against the control plane.
///
/// Implementations classify their failures into the error taxonomy; in particular, a create that
/// collides with an existing object must fail with [`Error::AlreadyExists`].
#[async_trait::async_trait]
pub trait Transport<K>: Send + Sync {
    async fn create(&self, obj: &K) -> Result<()>;

    async fn delete(&self, obj: &K) -> Result<()>;

    async fn update(&self, obj: &K) -> Result<()>;
}

/// A [`Transport`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeTransport {
    client: k8s::Client,
    status: bool,
}

// === impl KubeTransport ===

impl KubeTransport {
    pub fn new(client: k8s::Client) -> Self {
        Self {
            client,
            status: false,
        }
    }

    /// Targets the `status` subresource for updates.
    pub fn status(self) -> Self {
        Self {
            status: true,
            ..self
        }
    }

    fn api<K>(&self, obj: &K) -> Result<Api<K>>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        let ns = obj
            .namespace()
            .ok_or_else(|| Error::terminal(format_args!("{} has no namespace", describe(obj))))?;
        Ok(Api::namespaced(self.client.clone(), &ns))
    }
}

impl fmt::Debug for KubeTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeTransport")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<K> Transport<K> for KubeTransport
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    K: Clone + DeserializeOwned + Serialize + fmt::Debug + Send + Sync + 'static,
{
    async fn create(&self, obj: &K) -> Result<()> {
        let params = PostParams {
            field_manager: Some(INSTALL_CONTROLLER_NAME.to_string()),
            ..Default::default()
        };
        self.api(obj)?
            .create(&params, obj)
            .await
            .map_err(|error| classify(error, describe(obj)))?;
        Ok(())
    }

    async fn delete(&self, obj: &K) -> Result<()> {
        self.api(obj)?
            .delete(&obj.name_any(), &DeleteParams::default())
            .await
            .map_err(|error| classify(error, describe(obj)))?;
        Ok(())
    }

    async fn update(&self, obj: &K) -> Result<()> {
        let api = self.api(obj)?;
        let name = obj.name_any();

        // Drop the resource version so that the write is unconditional.
        let mut obj = obj.clone();
        obj.meta_mut().resource_version = None;
        obj.meta_mut().managed_fields = None;

        let res = if self.status {
            let params = PatchParams::apply(INSTALL_CONTROLLER_NAME);
            api.patch_status(&name, &params, &Patch::Merge(&obj)).await
        } else {
            let params = PostParams {
                field_manager: Some(INSTALL_CONTROLLER_NAME.to_string()),
                ..Default::default()
            };
            api.replace(&name, &params, &obj).await
        };
        res.map_err(|error| classify(error, describe(&obj)))?;
        Ok(())
    }
}

/// Maps a Kubernetes client error onto the error taxonomy. `what` names the object the request
/// was about.
pub fn classify(error: k8s::Error, what: impl ToString) -> Error {
    let rsp = match error {
        k8s::Error::Api(rsp) => rsp,
        // The request may not have reached the API server.
        error => return Error::transient(error),
    };

    match rsp {
        ErrorResponse { code: 409, ref reason, .. } if reason == "AlreadyExists" => {
            Error::AlreadyExists(what.to_string())
        }
        ErrorResponse { code: 404, .. } => Error::NotFound(what.to_string()),
        ErrorResponse {
            code: 408 | 409 | 429 | 500..=599,
            message,
            ..
        } => Error::Transient(message),
        ErrorResponse { message, .. } => Error::Terminal(message),
    }
}

fn describe<K: Resource<DynamicType = ()>>(obj: &K) -> String {
    match obj.namespace() {
        Some(ns) => format!("{} {ns}/{}", K::kind(&()), obj.name_any()),
        None => format!("{} {}", K::kind(&()), obj.name_any()),
    }
}
