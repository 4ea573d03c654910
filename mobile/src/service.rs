//! The [`Service`] view over mobile service secrets.

use std::collections::BTreeMap;

use k8s_openapi::{api::core::v1::Secret, ByteString};
use kube::{core::ObjectMeta, ResourceExt as _};
use mobile_crds::{INTEGRATION_ENABLED, MOBILE_SERVICE_ENABLED, MOBILE_SERVICE_LABEL};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    apis::Apis,
    error::{Error, Result, ResultExt as _},
    integration::is_known_provider,
};

/// Label marking a service as living outside this namespace.
pub const EXTERNAL_LABEL: &str = "external";

/// Label marking a service as one the user registered, and may remove.
pub const WRITABLE_LABEL: &str = "writable";

/// A mobile service, as described by its secret.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Name of the backing secret.
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub host: String,
    pub params: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub integrations: BTreeMap<String, ServiceIntegration>,
    pub external: bool,
    pub writable: bool,
}

/// A provider that a [`Service`] can be integrated with.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceIntegration {
    /// Name of the providing service.
    pub component: String,
    /// Secret backing the providing service.
    pub service_secret: String,
    pub enabled: bool,
    pub display_name: String,
    pub namespace: String,
}

fn data_string(value: &ByteString) -> String {
    String::from_utf8_lossy(&value.0).trim().to_string()
}

/// Project a secret onto a [`Service`]. Never fails: missing keys become
/// empty strings.
pub fn secret_to_service(secret: &Secret) -> Service {
    let data = secret.data.clone().unwrap_or_default();
    let get = |key: &str| data.get(key).map(data_string).unwrap_or_default();

    let name = get("name");
    let display_name = match get("displayName") {
        display_name if display_name.is_empty() => name.clone(),
        display_name => display_name,
    };

    let labels = secret.labels().clone();
    let label_is_true = |key: &str| labels.get(key).map(String::as_str) == Some("true");

    Service {
        id: secret.name_any(),
        display_name,
        namespace: secret.namespace().unwrap_or_default(),
        type_: get("type"),
        host: get("uri"),
        params: data
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "uri" | "name"))
            .map(|(key, value)| (key.clone(), data_string(value)))
            .collect(),
        external: label_is_true(EXTERNAL_LABEL),
        writable: label_is_true(WRITABLE_LABEL),
        integrations: BTreeMap::new(),
        labels,
        name,
    }
}

/// Inverse of [`secret_to_service`], used to register services by hand.
///
/// `type` and `displayName` are written as data keys, so they come back in
/// the parameter bag of the read service.
pub fn service_to_secret(service: &Service) -> Secret {
    let mut data: BTreeMap<String, ByteString> = service
        .params
        .iter()
        .map(|(key, value)| (key.clone(), ByteString(value.clone().into_bytes())))
        .collect();

    let mut put = |key: &str, value: &str| {
        if !value.is_empty() {
            data.insert(key.to_string(), ByteString(value.as_bytes().to_vec()));
        }
    };
    put("name", &service.name);
    put("uri", &service.host);
    put("type", &service.type_);
    if service.display_name != service.name {
        put("displayName", &service.display_name);
    }

    let mut labels = service.labels.clone();
    for (key, set) in [(EXTERNAL_LABEL, service.external), (WRITABLE_LABEL, service.writable)] {
        if set {
            labels.insert(key.to_string(), "true".to_string());
        }
    }

    Secret {
        metadata: ObjectMeta {
            name: Some(service.id.clone()),
            namespace: Some(service.namespace.clone()).filter(|ns| !ns.is_empty()),
            labels: Some(labels),
            ..ObjectMeta::default()
        },
        data: Some(data),
        ..Secret::default()
    }
}

pub fn mobile_service_selector() -> String {
    format!("{MOBILE_SERVICE_LABEL}={MOBILE_SERVICE_ENABLED}")
}

/// Every mobile service in the namespace, without integrations.
pub async fn list_services(apis: &Apis) -> Result<Vec<Service>> {
    let secrets = apis
        .cluster
        .list_secrets(&mobile_service_selector())
        .await
        .context(|| format!("failed to list mobile services in {}", apis.namespace))?;

    Ok(secrets.iter().map(secret_to_service).collect())
}

pub async fn get_service(apis: &Apis, name: &str) -> Result<Service> {
    let secret = apis
        .cluster
        .get_secret(name)
        .await
        .context(|| format!("failed to get service {name}"))?;

    Ok(secret_to_service(&secret))
}

/// A service registered by hand rather than provisioned from the catalog.
#[derive(Debug, Clone, Default)]
pub struct ExternalService {
    pub name: String,
    pub uri: String,
    pub type_: Option<String>,
    pub display_name: Option<String>,
    pub params: BTreeMap<String, String>,
}

pub async fn register_service(apis: &Apis, external: ExternalService) -> Result<Service> {
    if external.name.is_empty() || external.uri.is_empty() {
        return Err(Error::validation("a service name and uri are required"));
    }

    let mut params = external.params;
    let type_ = external.type_.unwrap_or_else(|| external.name.clone());
    params.insert("type".to_string(), type_.clone());
    let display_name = external.display_name.unwrap_or_else(|| external.name.clone());
    if display_name != external.name {
        params.insert("displayName".to_string(), display_name.clone());
    }

    let service = Service {
        id: external.name.clone(),
        name: external.name,
        display_name,
        namespace: apis.namespace.clone(),
        type_,
        host: external.uri,
        params,
        labels: BTreeMap::from([(
            MOBILE_SERVICE_LABEL.to_string(),
            MOBILE_SERVICE_ENABLED.to_string(),
        )]),
        external: true,
        writable: true,
        ..Service::default()
    };

    let secret = apis
        .cluster
        .create_secret(&service_to_secret(&service))
        .await
        .context(|| format!("failed to create service config {}", service.name))?;
    info!("registered service {}", service.name);

    Ok(secret_to_service(&secret))
}

/// Remove a service registered with [`register_service`].
pub async fn unregister_service(apis: &Apis, name: &str) -> Result<()> {
    let service = get_service(apis, name).await?;
    if !service.writable {
        return Err(Error::validation(format!(
            "service {name} is managed by the service catalog and cannot be deleted here"
        )));
    }

    apis.cluster
        .delete_secret(&service.id)
        .await
        .context(|| format!("failed to delete service config {name}"))?;
    info!("deleted service {name}");
    Ok(())
}

/// Integrations between `consumer` and every known provider among
/// `services`. `template_labels` are the labels on the consumer's pod
/// template, which record which providers have been enabled.
pub fn integrations_for(
    consumer: &Service,
    services: &[Service],
    template_labels: &BTreeMap<String, String>,
) -> BTreeMap<String, ServiceIntegration> {
    services
        .iter()
        .filter(|provider| provider.id != consumer.id && is_known_provider(&provider.name))
        .map(|provider| {
            let integration = ServiceIntegration {
                component: provider.name.clone(),
                service_secret: provider.id.clone(),
                enabled: template_labels.get(&provider.name).map(String::as_str)
                    == Some(INTEGRATION_ENABLED),
                display_name: provider.display_name.clone(),
                namespace: provider.namespace.clone(),
            };
            (provider.name.clone(), integration)
        })
        .collect()
}

/// Every mobile service in the namespace, with its integrations filled in.
pub async fn discover_services(apis: &Apis) -> Result<Vec<Service>> {
    let services = list_services(apis).await?;

    let mut discovered = Vec::with_capacity(services.len());
    for mut service in services.clone() {
        let template_labels = match apis.cluster.get_deployment(&service.name).await {
            Ok(deployment) => deployment
                .spec
                .and_then(|spec| spec.template.metadata)
                .and_then(|metadata| metadata.labels)
                .unwrap_or_default(),
            Err(kube::Error::Api(response)) if response.code == 404 => {
                debug!("service {} has no deployment", service.name);
                BTreeMap::new()
            }
            Err(err) => {
                return Err(err)
                    .context(|| format!("failed to get deployment for service {}", service.name))
            }
        };

        service.integrations = integrations_for(&service, &services, &template_labels);
        discovered.push(service);
    }

    Ok(discovered)
}
