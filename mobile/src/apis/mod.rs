//! Seams between the commands and the three external APIs: the cluster
//! itself, the service catalog and the mobile client custom resource.
//!
//! Commands only ever talk to these traits, which lets tests substitute
//! [`mockall`] mocks for the real [`kube::Api`] backed implementations
//! found in [`live`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use k8s_openapi::api::{apps::v1::Deployment, core::v1::Secret};
use mobile_crds::{
    Build, BuildConfig, ClusterServiceClass, ClusterServicePlan, MobileClient, PodPreset,
    ServiceBinding, ServiceInstance,
};

#[cfg(test)]
use mockall::automock;

use crate::error::Error;

pub mod live;

/// Core and OpenShift resources within the current namespace.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn list_secrets(&self, label_selector: &str) -> kube::Result<Vec<Secret>>;

    async fn get_secret(&self, name: &str) -> kube::Result<Secret>;

    async fn create_secret(&self, secret: &Secret) -> kube::Result<Secret>;

    async fn delete_secret(&self, name: &str) -> kube::Result<()>;

    async fn get_deployment(&self, name: &str) -> kube::Result<Deployment>;

    /// Replace the deployment wholesale. Changing the pod template causes
    /// a rolling restart.
    async fn replace_deployment(&self, deployment: &Deployment) -> kube::Result<Deployment>;

    async fn create_pod_preset(&self, preset: &PodPreset) -> kube::Result<PodPreset>;

    async fn delete_pod_preset(&self, name: &str) -> kube::Result<()>;

    async fn list_build_configs(&self, label_selector: &str) -> kube::Result<Vec<BuildConfig>>;

    async fn get_build_config(&self, name: &str) -> kube::Result<BuildConfig>;

    async fn create_build_config(&self, build_config: &BuildConfig) -> kube::Result<BuildConfig>;

    async fn delete_build_config(&self, name: &str) -> kube::Result<()>;

    /// Start a new build from the named build config.
    async fn instantiate_build_config(&self, name: &str) -> kube::Result<Build>;

    async fn list_builds(&self, label_selector: &str) -> kube::Result<Vec<Build>>;

    async fn cancel_build(&self, name: &str) -> kube::Result<Build>;
}

/// The service catalog: cluster scoped classes and plans, namespaced
/// instances and bindings.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn list_service_classes(&self) -> kube::Result<Vec<ClusterServiceClass>>;

    async fn list_service_plans(&self) -> kube::Result<Vec<ClusterServicePlan>>;

    async fn get_service_instance(&self, name: &str) -> kube::Result<ServiceInstance>;

    async fn list_service_instances(&self) -> kube::Result<Vec<ServiceInstance>>;

    async fn create_service_instance(
        &self,
        instance: &ServiceInstance,
    ) -> kube::Result<ServiceInstance>;

    async fn delete_service_instance(&self, name: &str) -> kube::Result<()>;

    /// Every version of every instance matching the selector, starting
    /// with the current state. Dropping the stream stops the watch.
    fn watch_service_instances(
        &self,
        label_selector: &str,
    ) -> BoxStream<'static, Result<ServiceInstance, Error>>;

    async fn get_service_binding(&self, name: &str) -> kube::Result<ServiceBinding>;

    async fn create_service_binding(
        &self,
        binding: &ServiceBinding,
    ) -> kube::Result<ServiceBinding>;

    async fn delete_service_binding(&self, name: &str) -> kube::Result<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MobileClientApi: Send + Sync {
    async fn create_client(&self, client: &MobileClient) -> kube::Result<MobileClient>;

    async fn get_client(&self, name: &str) -> kube::Result<MobileClient>;

    async fn list_clients(&self) -> kube::Result<Vec<MobileClient>>;

    async fn delete_client(&self, name: &str) -> kube::Result<()>;
}

/// Handles to the external APIs, scoped to one namespace.
#[derive(Clone)]
pub struct Apis {
    pub namespace: String,
    pub cluster: Arc<dyn ClusterApi>,
    pub catalog: Arc<dyn CatalogApi>,
    pub mobile: Arc<dyn MobileClientApi>,
}

impl Apis {
    pub fn new(
        namespace: impl Into<String>,
        cluster: impl ClusterApi + 'static,
        catalog: impl CatalogApi + 'static,
        mobile: impl MobileClientApi + 'static,
    ) -> Self {
        Apis {
            namespace: namespace.into(),
            cluster: Arc::new(cluster),
            catalog: Arc::new(catalog),
            mobile: Arc::new(mobile),
        }
    }

    /// Apis backed by a live cluster.
    pub fn live(client: kube::Client, namespace: &str) -> Self {
        Apis::new(
            namespace,
            live::LiveCluster::new(client.clone(), namespace),
            live::LiveCatalog::new(client.clone(), namespace),
            live::LiveMobileClients::new(client, namespace),
        )
    }
}

#[cfg(test)]
impl Apis {
    /// Apis where every call panics unless the test set an expectation.
    pub(crate) fn mocked(
        cluster: MockClusterApi,
        catalog: MockCatalogApi,
        mobile: MockMobileClientApi,
    ) -> Self {
        Apis::new("myproject", cluster, catalog, mobile)
    }
}
