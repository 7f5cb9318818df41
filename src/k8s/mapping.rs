use super::error::K8sError;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ListMeta;
use kube::core::GroupVersionKind;
use kube::discovery::ApiResource;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Decoded collection page as returned by the API server.
pub type PageObject = serde_json::Value;

/// Extracts list metadata from a decoded page without depending on its concrete shape.
pub trait MetadataAccessor: Send + Sync {
    fn resource_version(&self, obj: &PageObject) -> Result<String, K8sError>;
    fn continue_token(&self, obj: &PageObject) -> Result<String, K8sError>;
}

/// Reads the standard `metadata` block of a `*List` object.
///
/// Absent fields are reported as empty strings. Only a missing or malformed `metadata` block is
/// considered an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct ListMetaAccessor;

impl ListMetaAccessor {
    fn list_meta(obj: &PageObject) -> Result<ListMeta, K8sError> {
        let metadata = obj
            .get("metadata")
            .ok_or_else(|| K8sError::InvalidMetadata("object has no metadata".to_string()))?;
        serde_json::from_value(metadata.clone())
            .map_err(|err| K8sError::InvalidMetadata(err.to_string()))
    }
}

impl MetadataAccessor for ListMetaAccessor {
    fn resource_version(&self, obj: &PageObject) -> Result<String, K8sError> {
        Ok(Self::list_meta(obj)?.resource_version.unwrap_or_default())
    }

    fn continue_token(&self, obj: &PageObject) -> Result<String, K8sError> {
        Ok(Self::list_meta(obj)?.continue_.unwrap_or_default())
    }
}

/// Identifies the collection being listed: its kind, REST resource name and scope.
#[derive(Clone)]
pub struct ResourceMapping {
    pub gvk: GroupVersionKind,
    /// Plural REST resource name, e.g. `pods`.
    pub resource: String,
    pub namespaced: bool,
    metadata_accessor: Arc<dyn MetadataAccessor>,
}

impl Debug for ResourceMapping {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceMapping")
            .field("gvk", &self.gvk)
            .field("resource", &self.resource)
            .field("namespaced", &self.namespaced)
            .field("metadata_accessor", &"MetadataAccessor implementation")
            .finish()
    }
}

impl PartialEq for ResourceMapping {
    fn eq(&self, other: &Self) -> bool {
        self.gvk == other.gvk
            && self.resource == other.resource
            && self.namespaced == other.namespaced
    }
}

impl ResourceMapping {
    pub fn new(gvk: GroupVersionKind, resource: &str, namespaced: bool) -> Self {
        Self {
            gvk,
            resource: resource.to_string(),
            namespaced,
            metadata_accessor: Arc::new(ListMetaAccessor),
        }
    }

    pub fn with_metadata_accessor(mut self, accessor: Arc<dyn MetadataAccessor>) -> Self {
        self.metadata_accessor = accessor;
        self
    }

    pub fn metadata_accessor(&self) -> &dyn MetadataAccessor {
        self.metadata_accessor.as_ref()
    }

    /// `group/version`, or just `version` for the core group.
    pub fn group_version(&self) -> String {
        self.gvk.api_version()
    }

    pub fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk_with_plural(&self.gvk, &self.resource)
    }
}
