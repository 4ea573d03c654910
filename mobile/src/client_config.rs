//! Client SDK configuration rendered from the mobile services discovered
//! in a namespace.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::{
    apis::Apis,
    error::{Result, ResultExt as _},
    service::{get_service, list_services, Service},
};

pub const SYNC_SERVER: &str = "fh-sync-server";
pub const IDENTITY_BROKER: &str = "keycloak";

/// Parameters never handed out to clients.
const SENSITIVE_PARAMS: &[&str] = &["password", "token"];

/// Gateway parameters present on the sync server once it has been put
/// behind the API gateway.
const GATEWAY_ROUTE: &str = "apicast_route";
const GATEWAY_APP_ID: &str = "apicast_app_id";
const GATEWAY_APP_KEY: &str = "apicast_app_key";

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ServiceConfig {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub url: String,
    pub config: Value,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub version: u32,
    pub cluster_name: String,
    pub namespace: String,
    pub client_id: String,
    pub services: Vec<ServiceConfig>,
}

type Converter = fn(&Service) -> Result<ServiceConfig>;

fn converter_for(service: &Service) -> Converter {
    match service.name.as_str() {
        SYNC_SERVER => sync_server_config,
        IDENTITY_BROKER => identity_broker_config,
        _ => default_config,
    }
}

fn service_config(service: &Service, url: String, config: Value) -> ServiceConfig {
    ServiceConfig {
        id: service.id.clone(),
        name: service.name.clone(),
        type_: service.type_.clone(),
        url,
        config,
    }
}

fn default_config(service: &Service) -> Result<ServiceConfig> {
    let mut config: Map<String, Value> = service
        .params
        .iter()
        .filter(|(key, _)| !SENSITIVE_PARAMS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone().into()))
        .collect();
    config.insert("uri".to_string(), service.host.clone().into());
    config.insert("name".to_string(), service.name.clone().into());

    Ok(service_config(
        service,
        service.host.clone(),
        Value::Object(config),
    ))
}

/// Routes clients through the API gateway when the sync server sits
/// behind one.
fn sync_server_config(service: &Service) -> Result<ServiceConfig> {
    let param = |key: &str| service.params.get(key).filter(|value| !value.is_empty());

    let (url, headers) = match (
        param(GATEWAY_ROUTE),
        param(GATEWAY_APP_ID),
        param(GATEWAY_APP_KEY),
    ) {
        (Some(route), Some(app_id), Some(app_key)) => (
            route.clone(),
            json!({
                "app_id": app_id,
                "app_key": app_key,
            }),
        ),
        _ => (service.host.clone(), json!({})),
    };

    let config = json!({
        "uri": url,
        "headers": headers,
    });
    Ok(service_config(service, url, config))
}

fn identity_broker_config(service: &Service) -> Result<ServiceConfig> {
    // An absent installation parses as empty input and fails like a bad one.
    let installation = service
        .params
        .get("public_installation")
        .map(String::as_str)
        .unwrap_or_default();

    let config: Value = serde_json::from_str(installation).context(|| {
        format!(
            "failed to parse public_installation of service {}",
            service.name
        )
    })?;

    Ok(service_config(service, service.host.clone(), config))
}

/// Convert every service. The first failure aborts the whole conversion.
pub fn convert_services(services: &[Service]) -> Result<Vec<ServiceConfig>> {
    services
        .iter()
        .map(|service| converter_for(service)(service))
        .collect()
}

pub async fn service_configs(apis: &Apis) -> Result<Vec<ServiceConfig>> {
    convert_services(&list_services(apis).await?)
}

pub async fn service_config_for(apis: &Apis, name: &str) -> Result<ServiceConfig> {
    let service = get_service(apis, name).await?;
    converter_for(&service)(&service)
}

/// Configuration for the mobile client `client_id`, which must exist.
pub async fn client_config(apis: &Apis, cluster_name: &str, client_id: &str) -> Result<ClientConfig> {
    apis.mobile
        .get_client(client_id)
        .await
        .context(|| format!("failed to get mobile client {client_id}"))?;

    Ok(ClientConfig {
        version: 1,
        cluster_name: cluster_name.to_string(),
        namespace: apis.namespace.clone(),
        client_id: client_id.to_string(),
        services: service_configs(apis).await?,
    })
}
