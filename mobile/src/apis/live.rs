//! [`kube::Api`] backed implementations of the API traits.

use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt as _, TryStreamExt as _};
use k8s_openapi::{
    api::{apps::v1::Deployment, core::v1::Secret},
    serde_json::json,
};
use kube::{
    api::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
    runtime::{watcher, WatchStreamExt as _},
    Api, Client, ResourceExt as _,
};
use mobile_crds::{
    Build, BuildConfig, ClusterServiceClass, ClusterServicePlan, MobileClient, PodPreset,
    ServiceBinding, ServiceInstance,
};
use tracing::debug;

use super::{CatalogApi, ClusterApi, MobileClientApi};
use crate::error::Error;

pub struct LiveCluster {
    secrets: Api<Secret>,
    deployments: Api<Deployment>,
    pod_presets: Api<PodPreset>,
    build_configs: Api<BuildConfig>,
    builds: Api<Build>,
}

impl LiveCluster {
    pub fn new(client: Client, namespace: &str) -> Self {
        LiveCluster {
            secrets: Api::namespaced(client.clone(), namespace),
            deployments: Api::namespaced(client.clone(), namespace),
            pod_presets: Api::namespaced(client.clone(), namespace),
            build_configs: Api::namespaced(client.clone(), namespace),
            builds: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait]
impl ClusterApi for LiveCluster {
    async fn list_secrets(&self, label_selector: &str) -> kube::Result<Vec<Secret>> {
        debug!("listing secrets matching {label_selector:?}");
        let secrets = self
            .secrets
            .list(&ListParams::default().labels(label_selector))
            .await?;
        Ok(secrets.items)
    }

    async fn get_secret(&self, name: &str) -> kube::Result<Secret> {
        debug!("getting secret {name}");
        self.secrets.get(name).await
    }

    async fn create_secret(&self, secret: &Secret) -> kube::Result<Secret> {
        debug!("creating secret {}", secret.name_any());
        self.secrets.create(&PostParams::default(), secret).await
    }

    async fn delete_secret(&self, name: &str) -> kube::Result<()> {
        debug!("deleting secret {name}");
        self.secrets.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn get_deployment(&self, name: &str) -> kube::Result<Deployment> {
        debug!("getting deployment {name}");
        self.deployments.get(name).await
    }

    async fn replace_deployment(&self, deployment: &Deployment) -> kube::Result<Deployment> {
        debug!("replacing deployment {}", deployment.name_any());
        self.deployments
            .replace(&deployment.name_any(), &PostParams::default(), deployment)
            .await
    }

    async fn create_pod_preset(&self, preset: &PodPreset) -> kube::Result<PodPreset> {
        debug!("creating pod preset {}", preset.name_any());
        self.pod_presets.create(&PostParams::default(), preset).await
    }

    async fn delete_pod_preset(&self, name: &str) -> kube::Result<()> {
        debug!("deleting pod preset {name}");
        self.pod_presets
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn list_build_configs(&self, label_selector: &str) -> kube::Result<Vec<BuildConfig>> {
        debug!("listing build configs matching {label_selector:?}");
        let build_configs = self
            .build_configs
            .list(&ListParams::default().labels(label_selector))
            .await?;
        Ok(build_configs.items)
    }

    async fn get_build_config(&self, name: &str) -> kube::Result<BuildConfig> {
        debug!("getting build config {name}");
        self.build_configs.get(name).await
    }

    async fn create_build_config(&self, build_config: &BuildConfig) -> kube::Result<BuildConfig> {
        debug!("creating build config {}", build_config.name_any());
        self.build_configs
            .create(&PostParams::default(), build_config)
            .await
    }

    async fn delete_build_config(&self, name: &str) -> kube::Result<()> {
        debug!("deleting build config {name}");
        self.build_configs
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn instantiate_build_config(&self, name: &str) -> kube::Result<Build> {
        debug!("instantiating build config {name}");
        let request = json!({
            "kind": "BuildRequest",
            "apiVersion": "build.openshift.io/v1",
            "metadata": { "name": name },
        });

        self.build_configs
            .create_subresource(
                "instantiate",
                name,
                &PostParams::default(),
                serde_json::to_vec(&request).map_err(kube::Error::SerdeError)?,
            )
            .await
    }

    async fn list_builds(&self, label_selector: &str) -> kube::Result<Vec<Build>> {
        debug!("listing builds matching {label_selector:?}");
        let builds = self
            .builds
            .list(&ListParams::default().labels(label_selector))
            .await?;
        Ok(builds.items)
    }

    async fn cancel_build(&self, name: &str) -> kube::Result<Build> {
        debug!("cancelling build {name}");
        self.builds
            .patch(
                name,
                &PatchParams::default(),
                &Patch::Merge(json!({
                    "status": {
                        "cancelled": true,
                    },
                })),
            )
            .await
    }
}

pub struct LiveCatalog {
    classes: Api<ClusterServiceClass>,
    plans: Api<ClusterServicePlan>,
    instances: Api<ServiceInstance>,
    bindings: Api<ServiceBinding>,
}

impl LiveCatalog {
    pub fn new(client: Client, namespace: &str) -> Self {
        LiveCatalog {
            classes: Api::all(client.clone()),
            plans: Api::all(client.clone()),
            instances: Api::namespaced(client.clone(), namespace),
            bindings: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait]
impl CatalogApi for LiveCatalog {
    async fn list_service_classes(&self) -> kube::Result<Vec<ClusterServiceClass>> {
        debug!("listing cluster service classes");
        Ok(self.classes.list(&ListParams::default()).await?.items)
    }

    async fn list_service_plans(&self) -> kube::Result<Vec<ClusterServicePlan>> {
        debug!("listing cluster service plans");
        Ok(self.plans.list(&ListParams::default()).await?.items)
    }

    async fn get_service_instance(&self, name: &str) -> kube::Result<ServiceInstance> {
        debug!("getting service instance {name}");
        self.instances.get(name).await
    }

    async fn list_service_instances(&self) -> kube::Result<Vec<ServiceInstance>> {
        debug!("listing service instances");
        Ok(self.instances.list(&ListParams::default()).await?.items)
    }

    async fn create_service_instance(
        &self,
        instance: &ServiceInstance,
    ) -> kube::Result<ServiceInstance> {
        debug!(
            "creating service instance for {}",
            instance.spec.cluster_service_class_external_name
        );
        self.instances.create(&PostParams::default(), instance).await
    }

    async fn delete_service_instance(&self, name: &str) -> kube::Result<()> {
        debug!("deleting service instance {name}");
        self.instances
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    fn watch_service_instances(
        &self,
        label_selector: &str,
    ) -> BoxStream<'static, Result<ServiceInstance, Error>> {
        debug!("watching service instances matching {label_selector:?}");
        watcher(
            self.instances.clone(),
            watcher::Config::default().labels(label_selector),
        )
        .applied_objects()
        .map_err(Error::from)
        .boxed()
    }

    async fn get_service_binding(&self, name: &str) -> kube::Result<ServiceBinding> {
        debug!("getting service binding {name}");
        self.bindings.get(name).await
    }

    async fn create_service_binding(
        &self,
        binding: &ServiceBinding,
    ) -> kube::Result<ServiceBinding> {
        debug!("creating service binding {}", binding.name_any());
        self.bindings.create(&PostParams::default(), binding).await
    }

    async fn delete_service_binding(&self, name: &str) -> kube::Result<()> {
        debug!("deleting service binding {name}");
        self.bindings.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }
}

pub struct LiveMobileClients {
    clients: Api<MobileClient>,
}

impl LiveMobileClients {
    pub fn new(client: Client, namespace: &str) -> Self {
        LiveMobileClients {
            clients: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait]
impl MobileClientApi for LiveMobileClients {
    async fn create_client(&self, client: &MobileClient) -> kube::Result<MobileClient> {
        debug!("creating mobile client {}", client.name_any());
        self.clients.create(&PostParams::default(), client).await
    }

    async fn get_client(&self, name: &str) -> kube::Result<MobileClient> {
        debug!("getting mobile client {name}");
        self.clients.get(name).await
    }

    async fn list_clients(&self) -> kube::Result<Vec<MobileClient>> {
        debug!("listing mobile clients");
        Ok(self.clients.list(&ListParams::default()).await?.items)
    }

    async fn delete_client(&self, name: &str) -> kube::Result<()> {
        debug!("deleting mobile client {name}");
        self.clients.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }
}
