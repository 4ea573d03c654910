//! Integrating one mobile service (the consumer) with another (the
//! provider) through a service binding and a pod preset.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{SecretVolumeSource, Volume, VolumeMount},
    apimachinery::pkg::apis::meta::v1::LabelSelector,
};
use kube::{core::ObjectMeta, ResourceExt as _};
use mobile_crds::{
    LocalObjectReference, PodPreset, PodPresetSpec, ServiceBinding, ServiceBindingSpec,
    ServiceInstance, INTEGRATION_ENABLED, SERVICE_NAME_LABEL,
};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::{
    apis::Apis,
    error::{Error, Result, ResultExt as _},
    service::{discover_services, get_service, Service},
};

/// Computes provider specific binding parameters on top of the common ones.
type ParamOverride = fn(provider: &Service, consumer: &Service, params: &mut Map<String, Value>);

/// Providers needing more than their own parameters to be bound, keyed by
/// provider service name.
const PARAM_OVERRIDES: &[(&str, ParamOverride)] = &[
    ("3scale", api_gateway_params),
    ("keycloak", identity_broker_params),
];

fn api_gateway_params(_provider: &Service, consumer: &Service, params: &mut Map<String, Value>) {
    params.insert(
        "app_key".to_string(),
        uuid::Uuid::new_v4().to_string().into(),
    );
    params.insert("service_name".to_string(), consumer.name.clone().into());
    params.insert("service_route".to_string(), consumer.host.clone().into());
    params.insert("service_secret".to_string(), consumer.id.clone().into());
    params.insert(
        "service_namespace".to_string(),
        consumer.namespace.clone().into(),
    );
}

fn identity_broker_params(
    _provider: &Service,
    consumer: &Service,
    params: &mut Map<String, Value>,
) {
    params.insert("service_name".to_string(), consumer.name.clone().into());
}

/// Whether `name` is a provider other services can be integrated with.
pub fn is_known_provider(name: &str) -> bool {
    PARAM_OVERRIDES.iter().any(|(provider, _)| *provider == name)
}

/// Parameters for a binding of `consumer` to `provider`.
///
/// Provider parameters are copied over the `credentials` entry, so a
/// provider parameter named `credentials` replaces it. Overrides win.
pub fn build_bind_params(provider: &Service, consumer: &Service) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert(
        "credentials".to_string(),
        json!({
            "route": provider.host,
            "service_secret": consumer.id,
        }),
    );

    for (key, value) in &provider.params {
        params.insert(key.clone(), value.clone().into());
    }

    if let Some((_, param_override)) = PARAM_OVERRIDES
        .iter()
        .find(|(name, _)| *name == provider.name)
    {
        param_override(provider, consumer, &mut params);
    }

    params
}

/// Name shared by the binding, its secret and the pod preset.
pub fn integration_name(consumer: &Service, provider: &Service) -> String {
    format!("{}-{}", consumer.name, provider.name)
}

/// Where the binding secret for `provider` is mounted in consumer pods.
pub fn mount_path(provider: &str) -> String {
    format!("/etc/secrets/{provider}")
}

fn build_binding(
    name: &str,
    namespace: &str,
    provider_instance: &ServiceInstance,
    params: Map<String, Value>,
) -> ServiceBinding {
    let mut binding = ServiceBinding::new(
        name,
        ServiceBindingSpec {
            instance_ref: LocalObjectReference {
                name: provider_instance.name_any(),
            },
            secret_name: name.to_string(),
            parameters: Some(Value::Object(params)),
            ..ServiceBindingSpec::default()
        },
    );
    binding.metadata.namespace = Some(namespace.to_string());
    binding
}

fn build_pod_preset(
    name: &str,
    namespace: &str,
    consumer: &Service,
    provider: &Service,
) -> PodPreset {
    PodPreset {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        spec: PodPresetSpec {
            selector: LabelSelector {
                match_labels: Some(BTreeMap::from([
                    ("run".to_string(), consumer.name.clone()),
                    (provider.name.clone(), INTEGRATION_ENABLED.to_string()),
                ])),
                ..LabelSelector::default()
            },
            volumes: vec![Volume {
                name: provider.name.clone(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(name.to_string()),
                    ..SecretVolumeSource::default()
                }),
                ..Volume::default()
            }],
            volume_mounts: vec![VolumeMount {
                name: provider.name.clone(),
                mount_path: mount_path(&provider.name),
                ..VolumeMount::default()
            }],
            ..PodPresetSpec::default()
        },
    }
}

/// The consumer and provider services behind two service instances.
struct Resolved {
    consumer: Service,
    provider: Service,
    provider_instance: ServiceInstance,
}

async fn backing_service(apis: &Apis, instance: &ServiceInstance) -> Result<Service> {
    let service_name = instance.labels().get(SERVICE_NAME_LABEL).ok_or_else(|| {
        Error::validation(format!(
            "service instance {} has no {SERVICE_NAME_LABEL} label",
            instance.name_any()
        ))
    })?;

    get_service(apis, service_name).await
}

async fn resolve(apis: &Apis, consumer_id: &str, provider_id: &str) -> Result<Resolved> {
    let provider_instance = apis
        .catalog
        .get_service_instance(provider_id)
        .await
        .context(|| format!("failed to get provider service instance {provider_id}"))?;
    let consumer_instance = apis
        .catalog
        .get_service_instance(consumer_id)
        .await
        .context(|| format!("failed to get consumer service instance {consumer_id}"))?;

    let provider = backing_service(apis, &provider_instance).await?;
    let consumer = backing_service(apis, &consumer_instance).await?;

    Ok(Resolved {
        consumer,
        provider,
        provider_instance,
    })
}

/// Add or remove the `<provider>=enabled` label on the consumer's pod
/// template, triggering a rollout.
async fn redeploy(apis: &Apis, consumer: &Service, provider: &Service, enable: bool) -> Result<()> {
    let mut deployment = apis
        .cluster
        .get_deployment(&consumer.name)
        .await
        .context(|| format!("failed to get deployment for service {}", consumer.name))?;

    let template_metadata = deployment
        .spec
        .as_mut()
        .ok_or_else(|| {
            Error::validation(format!("deployment {} has no spec", consumer.name))
        })?
        .template
        .metadata
        .get_or_insert_with(ObjectMeta::default);
    let labels = template_metadata.labels.get_or_insert_with(BTreeMap::new);

    if enable {
        labels.insert(provider.name.clone(), INTEGRATION_ENABLED.to_string());
    } else {
        labels.remove(&provider.name);
    }

    apis.cluster
        .replace_deployment(&deployment)
        .await
        .context(|| format!("failed to update deployment for service {}", consumer.name))?;

    info!("redeploying {}", consumer.name);
    Ok(())
}

/// Outcome of creating or deleting an integration.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationChange {
    pub binding: String,
    pub consumer: String,
    pub provider: String,
    pub redeployed: bool,
}

impl IntegrationChange {
    /// What the user still has to do, if anything.
    pub fn instructions(&self) -> Option<String> {
        (!self.redeployed).then(|| {
            format!(
                "did not auto redeploy. You will need to redeploy {} before the \
                 {} integration takes effect. Use --auto-redeploy to have this done automatically",
                self.consumer, self.provider
            )
        })
    }
}

/// Bind the provider instance to the consumer instance and mount the
/// resulting secret into the consumer's pods.
///
/// Stops at the first failure without undoing earlier steps.
pub async fn create_integration(
    apis: &Apis,
    consumer_id: &str,
    provider_id: &str,
    auto_redeploy: bool,
) -> Result<IntegrationChange> {
    let Resolved {
        consumer,
        provider,
        provider_instance,
    } = resolve(apis, consumer_id, provider_id).await?;

    let name = integration_name(&consumer, &provider);
    let params = build_bind_params(&provider, &consumer);

    let binding = build_binding(&name, &apis.namespace, &provider_instance, params);
    apis.catalog
        .create_service_binding(&binding)
        .await
        .context(|| format!("failed to create binding for service {}", consumer.name))?;
    info!("created binding {name}");

    let preset = build_pod_preset(&name, &apis.namespace, &consumer, &provider);
    apis.cluster
        .create_pod_preset(&preset)
        .await
        .context(|| format!("failed to create pod preset for service {}", consumer.name))?;
    info!("created pod preset {name}");

    if auto_redeploy {
        redeploy(apis, &consumer, &provider, true).await?;
    }

    Ok(IntegrationChange {
        binding: name,
        consumer: consumer.name,
        provider: provider.name,
        redeployed: auto_redeploy,
    })
}

/// Undo [`create_integration`].
///
/// Stops at the first failure without undoing earlier steps.
pub async fn delete_integration(
    apis: &Apis,
    consumer_id: &str,
    provider_id: &str,
    auto_redeploy: bool,
) -> Result<IntegrationChange> {
    let Resolved {
        consumer, provider, ..
    } = resolve(apis, consumer_id, provider_id).await?;

    let name = integration_name(&consumer, &provider);

    apis.cluster
        .delete_pod_preset(&name)
        .await
        .context(|| format!("failed to delete pod preset for service {}", consumer.name))?;
    info!("deleted pod preset {name}");

    apis.catalog
        .delete_service_binding(&name)
        .await
        .context(|| format!("failed to delete binding for service {}", consumer.name))?;
    info!("deleted binding {name}");

    if auto_redeploy {
        redeploy(apis, &consumer, &provider, false).await?;
    }

    Ok(IntegrationChange {
        binding: name,
        consumer: consumer.name,
        provider: provider.name,
        redeployed: auto_redeploy,
    })
}

/// The binding created for two service instances.
pub async fn get_integration(
    apis: &Apis,
    consumer_id: &str,
    provider_id: &str,
) -> Result<ServiceBinding> {
    let Resolved {
        consumer, provider, ..
    } = resolve(apis, consumer_id, provider_id).await?;

    let name = integration_name(&consumer, &provider);
    apis.catalog
        .get_service_binding(&name)
        .await
        .context(|| format!("failed to get binding for service {}", consumer.name))
}

/// One row of `get integrations`.
#[derive(serde::Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationSummary {
    pub consumer: String,
    pub provider: String,
    pub enabled: bool,
    pub mount_path: String,
}

pub async fn list_integrations(apis: &Apis) -> Result<Vec<IntegrationSummary>> {
    let services = discover_services(apis).await?;

    Ok(services
        .iter()
        .flat_map(|consumer| {
            consumer
                .integrations
                .values()
                .map(|integration| IntegrationSummary {
                    consumer: consumer.name.clone(),
                    provider: integration.component.clone(),
                    enabled: integration.enabled,
                    mount_path: mount_path(&integration.component),
                })
        })
        .collect())
}
