use super::error::K8sError;
use super::mapping::{PageObject, ResourceMapping};
use super::watch::EventStream;
use duration_str::deserialize_duration;
use futures::stream::BoxStream;
use futures::StreamExt;
use kube::api::{ListParams, WatchEvent, WatchParams};
use kube::config::KubeConfigOptions;
use kube::core::{DynamicObject, GroupVersion, GroupVersionKind, Request};
use kube::discovery::ApiResource;
use kube::{Api, Client, Config, Resource};
use serde::Deserialize;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, trace};

const INCLUDE_UNINITIALIZED_PARAM: &str = "includeUninitialized=true";
const EXPORT_PARAM: &str = "export=true";

/// Request options forwarded verbatim on every list call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub label_selector: String,
    pub include_uninitialized: bool,
    /// Maximum number of items per page. Zero or negative lets the server decide.
    pub limit: i64,
    /// Continue token returned by the previous page. Empty for the first one.
    pub continue_token: String,
}

/// Fetches collection pages and opens watches against the API server.
///
/// Implementations own transport, URL construction and decoding. Errors are returned as they are
/// received, retries (if any) are up to the implementation.
#[cfg_attr(test, mockall::automock)]
pub trait CollectionClient: Send + Sync {
    fn list(
        &self,
        mapping: &ResourceMapping,
        namespace: &str,
        group_version: &str,
        export: bool,
        options: &ListOptions,
    ) -> Result<PageObject, K8sError>;

    fn watch(
        &self,
        mapping: &ResourceMapping,
        namespace: &str,
        resource_version: &str,
        group_version: &str,
        label_selector: &str,
    ) -> Result<EventStream, K8sError>;
}

/// Same as upstream kube-rs default client timeout (read/write).
///
/// It sits between the watcher default timeout (290s) and the k8s max watch timeout (300s) so
/// long-polling watches are not cut by the client.
const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(295);

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct ClientConfig {
    /// The maximum duration the client will wait for a response from the API server.
    #[serde(default)]
    pub client_timeout: ClientTimeout,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct ClientTimeout(#[serde(deserialize_with = "deserialize_duration")] Duration);

impl Default for ClientTimeout {
    fn default() -> Self {
        Self(DEFAULT_CLIENT_TIMEOUT)
    }
}

impl From<ClientTimeout> for Duration {
    fn from(value: ClientTimeout) -> Self {
        value.0
    }
}

/// Provides a _sync_ implementation of [CollectionClient] on top of [AsyncCollectionClient].
///
/// Every call blocks on the shared runtime, so it must not be used from inside an async context
/// driven by that same runtime.
pub struct SyncCollectionClient {
    async_client: AsyncCollectionClient,
    runtime: Arc<Runtime>,
}

impl Debug for SyncCollectionClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCollectionClient")
            .field("async_client", &"AsyncCollectionClient implementation")
            .field("runtime", &self.runtime)
            .finish()
    }
}

impl SyncCollectionClient {
    pub fn try_new(runtime: Arc<Runtime>, config: &ClientConfig) -> Result<Self, K8sError> {
        Ok(Self {
            async_client: runtime.block_on(AsyncCollectionClient::try_new(config))?,
            runtime,
        })
    }

    pub fn new(runtime: Arc<Runtime>, client: Client) -> Self {
        Self {
            async_client: AsyncCollectionClient::new(client),
            runtime,
        }
    }
}

impl CollectionClient for SyncCollectionClient {
    fn list(
        &self,
        mapping: &ResourceMapping,
        namespace: &str,
        group_version: &str,
        export: bool,
        options: &ListOptions,
    ) -> Result<PageObject, K8sError> {
        self.runtime.block_on(self.async_client.list(
            mapping,
            namespace,
            group_version,
            export,
            options,
        ))
    }

    fn watch(
        &self,
        mapping: &ResourceMapping,
        namespace: &str,
        resource_version: &str,
        group_version: &str,
        label_selector: &str,
    ) -> Result<EventStream, K8sError> {
        let stream = self.runtime.block_on(self.async_client.watch(
            mapping,
            namespace,
            resource_version,
            group_version,
            label_selector,
        ))?;
        Ok(EventStream::from_async(self.runtime.clone(), stream))
    }
}

pub struct AsyncCollectionClient {
    client: Client,
}

impl AsyncCollectionClient {
    /// Constructs a new Kubernetes client.
    ///
    /// If loading from the inCluster config fail we fall back to kube-config
    /// This will respect the `$KUBECONFIG` envvar, but otherwise default to `~/.kube/config`.
    pub async fn try_new(client_config: &ClientConfig) -> Result<Self, K8sError> {
        debug!("trying inClusterConfig for k8s client");

        let mut config = match Config::incluster() {
            Ok(c) => c,
            Err(e) => {
                debug!("inClusterConfig {}, trying kubeconfig for k8s client", e);
                let c = KubeConfigOptions::default();
                Config::from_kubeconfig(&c).await?
            }
        };
        config.read_timeout = Some(client_config.client_timeout.into());
        config.write_timeout = Some(client_config.client_timeout.into());

        let client = Client::try_from(config)?;

        debug!("k8s client initialization succeeded");
        Ok(Self::new(client))
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetches a single page of the collection and returns it undecoded.
    pub async fn list(
        &self,
        mapping: &ResourceMapping,
        namespace: &str,
        group_version: &str,
        export: bool,
        options: &ListOptions,
    ) -> Result<PageObject, K8sError> {
        let api_resource = api_resource(mapping, group_version)?;
        let url_path = DynamicObject::url_path(&api_resource, scoped_namespace(mapping, namespace));

        let mut request = Request::new(url_path)
            .list(&list_params(options))
            .map_err(|err| K8sError::BuildRequest(err.to_string()))?;

        let extra_params: Vec<&str> = [
            (options.include_uninitialized, INCLUDE_UNINITIALIZED_PARAM),
            (export, EXPORT_PARAM),
        ]
        .into_iter()
        .filter_map(|(enabled, param)| enabled.then_some(param))
        .collect();

        if !extra_params.is_empty() {
            let uri = format!("{}&{}", request.uri(), extra_params.join("&"));
            *request.uri_mut() = uri
                .parse()
                .map_err(|err: http::uri::InvalidUri| K8sError::BuildRequest(err.to_string()))?;
        }

        trace!("listing collection: {}", request.uri());
        Ok(self.client.request::<PageObject>(request).await?)
    }

    /// Opens a watch on the collection starting at `resource_version`.
    pub async fn watch(
        &self,
        mapping: &ResourceMapping,
        namespace: &str,
        resource_version: &str,
        group_version: &str,
        label_selector: &str,
    ) -> Result<BoxStream<'static, Result<WatchEvent<DynamicObject>, kube::Error>>, K8sError> {
        let api_resource = api_resource(mapping, group_version)?;
        let api: Api<DynamicObject> = match scoped_namespace(mapping, namespace) {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &api_resource),
            None => Api::all_with(self.client.clone(), &api_resource),
        };

        let mut params = WatchParams::default();
        if !label_selector.is_empty() {
            params = params.labels(label_selector);
        }

        debug!(
            "opening watch on {} from resourceVersion {:?}",
            mapping.resource, resource_version
        );
        Ok(api.watch(&params, resource_version).await?.boxed())
    }
}

/// The kind's resource in the requested group version.
fn api_resource(mapping: &ResourceMapping, group_version: &str) -> Result<ApiResource, K8sError> {
    let gv: GroupVersion = group_version.parse()?;
    let gvk = GroupVersionKind::gvk(&gv.group, &gv.version, &mapping.gvk.kind);
    Ok(ApiResource::from_gvk_with_plural(&gvk, &mapping.resource))
}

/// Empty namespaces and cluster-scoped kinds list across the whole cluster.
fn scoped_namespace<'a>(mapping: &ResourceMapping, namespace: &'a str) -> Option<&'a str> {
    (mapping.namespaced && !namespace.is_empty()).then_some(namespace)
}

fn list_params(options: &ListOptions) -> ListParams {
    let mut params = ListParams::default();
    if !options.label_selector.is_empty() {
        params = params.labels(&options.label_selector);
    }
    if options.limit > 0 {
        params = params.limit(u32::try_from(options.limit).unwrap_or(u32::MAX));
    }
    if !options.continue_token.is_empty() {
        params = params.continue_token(&options.continue_token);
    }
    params
}
