use super::client::{CollectionClient, ListOptions};
use super::error::{classify, K8sError, ListErrorDisposition};
use super::mapping::{PageObject, ResourceMapping};
use super::watch::EventStream;
use crate::config::SelectorConfig;
use kube::api::ObjectList;
use kube::core::DynamicObject;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tracing::debug;

/// One fetched page handed to the visitor.
pub struct Info {
    pub client: Arc<dyn CollectionClient>,
    pub mapping: Arc<ResourceMapping>,
    pub namespace: String,
    pub object: PageObject,
    pub resource_version: String,
}

impl Debug for Info {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Info")
            .field("mapping", &self.mapping)
            .field("namespace", &self.namespace)
            .field("object", &self.object)
            .field("resource_version", &self.resource_version)
            .finish_non_exhaustive()
    }
}

impl Info {
    /// Decodes the page into a typed list.
    pub fn object_list(&self) -> Result<ObjectList<DynamicObject>, K8sError> {
        Ok(serde_json::from_value(self.object.clone())?)
    }
}

/// Visits every object matching a label selector, one page at a time.
pub struct Selector {
    client: Arc<dyn CollectionClient>,
    mapping: Arc<ResourceMapping>,
    namespace: String,
    label_selector: String,
    export: bool,
    include_uninitialized: bool,
    limit_chunks: i64,
}

impl Debug for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selector")
            .field("mapping", &self.mapping)
            .field("namespace", &self.namespace)
            .field("label_selector", &self.label_selector)
            .field("export", &self.export)
            .field("include_uninitialized", &self.include_uninitialized)
            .field("limit_chunks", &self.limit_chunks)
            .finish_non_exhaustive()
    }
}

impl Selector {
    pub fn new(
        client: Arc<dyn CollectionClient>,
        mapping: Arc<ResourceMapping>,
        namespace: &str,
        label_selector: &str,
        export: bool,
        include_uninitialized: bool,
        limit_chunks: i64,
    ) -> Self {
        Self {
            client,
            mapping,
            namespace: namespace.to_string(),
            label_selector: label_selector.to_string(),
            export,
            include_uninitialized,
            limit_chunks,
        }
    }

    pub fn from_config(client: Arc<dyn CollectionClient>, config: &SelectorConfig) -> Self {
        Self::new(
            client,
            Arc::new(config.resource.mapping()),
            &config.namespace,
            &config.effective_label_selector(),
            config.export,
            config.include_uninitialized,
            config.chunk_size,
        )
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn label_selector(&self) -> &str {
        &self.label_selector
    }

    pub fn resource_mapping(&self) -> &ResourceMapping {
        &self.mapping
    }

    /// Fetches the collection page by page and feeds each one to `visitor`.
    ///
    /// Pages are requested sequentially, the next one only after the visitor returned. The
    /// visitor never receives an error from this selector; returning one aborts the traversal and
    /// is propagated as is. An expired continue token ends the traversal with the server error,
    /// callers must start over.
    pub fn visit<F>(&self, mut visitor: F) -> Result<(), K8sError>
    where
        F: FnMut(Info, Option<K8sError>) -> Result<(), K8sError>,
    {
        let group_version = self.mapping.group_version();
        let mut continue_token = String::new();
        loop {
            let options = ListOptions {
                label_selector: self.label_selector.clone(),
                include_uninitialized: self.include_uninitialized,
                limit: self.limit_chunks,
                continue_token,
            };
            let list = self
                .client
                .list(
                    &self.mapping,
                    &self.namespace,
                    &group_version,
                    self.export,
                    &options,
                )
                .map_err(|err| self.list_error(err))?;

            let accessor = self.mapping.metadata_accessor();
            let resource_version = accessor.resource_version(&list).unwrap_or_else(|err| {
                debug!(
                    "ignoring unreadable resourceVersion of {}: {}",
                    self.mapping.resource, err
                );
                String::new()
            });
            let next_continue_token = accessor.continue_token(&list).unwrap_or_else(|err| {
                debug!(
                    "ignoring unreadable continue token of {}: {}",
                    self.mapping.resource, err
                );
                String::new()
            });

            debug!(
                "fetched {} page at resourceVersion {:?}, more pages: {}",
                self.mapping.resource,
                resource_version,
                !next_continue_token.is_empty()
            );

            let info = Info {
                client: self.client.clone(),
                mapping: self.mapping.clone(),
                namespace: self.namespace.clone(),
                object: list,
                resource_version,
            };
            visitor(info, None)?;

            if next_continue_token.is_empty() {
                return Ok(());
            }
            continue_token = next_continue_token;
        }
    }

    /// Opens a watch with the same namespace, kind and selector used for listing.
    ///
    /// Errors are returned untouched. Consuming and stopping the stream is up to the caller.
    pub fn watch(&self, resource_version: &str) -> Result<EventStream, K8sError> {
        self.client.watch(
            &self.mapping,
            &self.namespace,
            resource_version,
            &self.mapping.group_version(),
            &self.label_selector,
        )
    }

    fn list_error(&self, err: K8sError) -> K8sError {
        match classify(&err) {
            ListErrorDisposition::Expired | ListErrorDisposition::Other => err,
            ListErrorDisposition::SelectorMismatch => {
                err.describe_list_failure(&self.mapping.resource, &self.label_selector)
            }
        }
    }
}
