//! Mobile services offered by the service catalog, and their instances.

use std::{collections::BTreeMap, future::Future, time::Duration};

use kube::ResourceExt as _;
use mobile_crds::{
    ClusterServiceClass, ClusterServicePlan, ServiceInstance, ServiceInstanceSpec,
    MOBILE_SERVICE_TAG, PROVISION_ID_LABEL, SERVICE_NAME_LABEL,
};
use serde_json::{Map, Value};
use tracing::info;

use crate::{
    apis::Apis,
    error::{Error, Result, ResultExt as _},
    wait::until_condition,
};

const DEFAULT_PLAN: &str = "default";

/// Service classes tagged as mobile services.
pub async fn list_mobile_services(apis: &Apis) -> Result<Vec<ClusterServiceClass>> {
    let classes = apis
        .catalog
        .list_service_classes()
        .await
        .context(|| "failed to list service classes")?;

    Ok(classes
        .into_iter()
        .filter(|class| class.spec.tags.iter().any(|tag| tag == MOBILE_SERVICE_TAG))
        .collect())
}

/// Instances of the service class with external name `service_name`.
pub async fn list_instances(apis: &Apis, service_name: &str) -> Result<Vec<ServiceInstance>> {
    let instances = apis
        .catalog
        .list_service_instances()
        .await
        .context(|| format!("failed to list service instances in {}", apis.namespace))?;

    Ok(instances
        .into_iter()
        .filter(|instance| instance.spec.cluster_service_class_external_name == service_name)
        .collect())
}

pub async fn delete_instance(apis: &Apis, id: &str) -> Result<()> {
    apis.catalog
        .delete_service_instance(id)
        .await
        .context(|| format!("failed to delete service instance {id}"))?;
    info!("deleted service instance {id}");
    Ok(())
}

/// Parse `key=value` pairs into instance parameters.
pub fn parse_params(pairs: &[String]) -> Result<Map<String, Value>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                Ok((key.to_string(), Value::String(value.to_string())))
            }
            _ => Err(Error::validation(format!(
                "invalid parameter {pair:?}, expected key=value"
            ))),
        })
        .collect()
}

/// The plan named `requested`, else the default plan, else the first plan
/// of the class.
pub fn pick_plan<'a>(
    class: &ClusterServiceClass,
    plans: &'a [ClusterServicePlan],
    requested: Option<&str>,
) -> Result<&'a ClusterServicePlan> {
    let class_name = class.name_any();
    let mut class_plans = plans
        .iter()
        .filter(|plan| plan.spec.cluster_service_class_ref.name == class_name);

    match requested {
        Some(requested) => class_plans
            .find(|plan| plan.spec.external_name == requested)
            .ok_or_else(|| {
                Error::validation(format!(
                    "service {} has no plan named {requested}",
                    class.spec.external_name
                ))
            }),
        None => {
            let class_plans: Vec<_> = class_plans.collect();
            class_plans
                .iter()
                .find(|plan| plan.spec.external_name == DEFAULT_PLAN)
                .or_else(|| class_plans.first())
                .copied()
                .ok_or_else(|| {
                    Error::validation(format!(
                        "service {} has no plans",
                        class.spec.external_name
                    ))
                })
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProvisionOptions {
    pub plan: Option<String>,
    pub params: Map<String, Value>,
    pub wait: bool,
    pub timeout: Option<Duration>,
}

/// Provision a new instance of the mobile service `service_name`, and
/// unless told otherwise, wait for it to become ready.
pub async fn create_instance<C>(
    apis: &Apis,
    service_name: &str,
    options: ProvisionOptions,
    cancel: C,
) -> Result<ServiceInstance>
where
    C: Future<Output = ()>,
{
    let classes = list_mobile_services(apis).await?;
    let class = classes
        .iter()
        .find(|class| class.spec.external_name == service_name)
        .ok_or_else(|| Error::validation(format!("no mobile service named {service_name}")))?;

    let plans = apis
        .catalog
        .list_service_plans()
        .await
        .context(|| format!("failed to list plans for service {service_name}"))?;
    let plan = pick_plan(class, &plans, options.plan.as_deref())?;

    let provision_id = uuid::Uuid::new_v4().to_string();
    let mut instance = ServiceInstance::new(
        "",
        ServiceInstanceSpec {
            cluster_service_class_external_name: class.spec.external_name.clone(),
            cluster_service_plan_external_name: plan.spec.external_name.clone(),
            parameters: Some(Value::Object(options.params)),
            ..ServiceInstanceSpec::default()
        },
    );
    instance.metadata.name = None;
    instance.metadata.generate_name = Some(format!("{service_name}-"));
    instance.metadata.namespace = Some(apis.namespace.clone());
    instance.metadata.labels = Some(BTreeMap::from([
        (SERVICE_NAME_LABEL.to_string(), service_name.to_string()),
        (PROVISION_ID_LABEL.to_string(), provision_id.clone()),
    ]));

    let created = apis
        .catalog
        .create_service_instance(&instance)
        .await
        .context(|| format!("failed to create service instance of {service_name}"))?;
    info!(
        "provisioning {} as service instance {}",
        service_name,
        created.name_any()
    );

    if !options.wait {
        return Ok(created);
    }

    let events = apis
        .catalog
        .watch_service_instances(&format!("{PROVISION_ID_LABEL}={provision_id}"));
    let ready = until_condition(events, ServiceInstance::is_ready, options.timeout, cancel).await?;
    info!("service instance {} is ready", ready.name_any());

    Ok(ready)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::{future, stream, StreamExt as _};
    use kube::ResourceExt as _;
    use mobile_crds::{
        ClusterServiceClass, ClusterServiceClassSpec, ClusterServicePlan, ClusterServicePlanSpec,
        Condition, LocalObjectReference, ServiceInstanceStatus,
    };
    use serde_json::json;

    use super::{create_instance, list_instances, parse_params, pick_plan, ProvisionOptions};
    use crate::{
        apis::{Apis, MockCatalogApi, MockClusterApi, MockMobileClientApi},
        error::Error,
        testing::instance,
    };

    fn class(name: &str, external_name: &str, tags: &[&str]) -> ClusterServiceClass {
        ClusterServiceClass::new(
            name,
            ClusterServiceClassSpec {
                external_name: external_name.to_string(),
                tags: tags.iter().map(|tag| tag.to_string()).collect(),
                ..ClusterServiceClassSpec::default()
            },
        )
    }

    fn plan(name: &str, external_name: &str, class: &str) -> ClusterServicePlan {
        ClusterServicePlan::new(
            name,
            ClusterServicePlanSpec {
                external_name: external_name.to_string(),
                cluster_service_class_ref: LocalObjectReference {
                    name: class.to_string(),
                },
                ..ClusterServicePlanSpec::default()
            },
        )
    }

    #[test]
    fn params() {
        let params = parse_params(&["realm=myproject".to_string(), "url=a=b".to_string()]).unwrap();
        assert_eq!(
            serde_json::Value::Object(params),
            json!({ "realm": "myproject", "url": "a=b" })
        );

        assert!(parse_params(&["novalue".to_string()]).is_err());
        assert!(parse_params(&["=value".to_string()]).is_err());
    }

    #[test]
    fn plan_selection() {
        let keycloak = class("kc-class", "keycloak", &["mobile-service"]);
        let plans = vec![
            plan("p0", "other", "sync-class"),
            plan("p1", "shared", "kc-class"),
            plan("p2", "default", "kc-class"),
        ];

        assert_eq!(pick_plan(&keycloak, &plans, None).unwrap().name_any(), "p2");
        assert_eq!(
            pick_plan(&keycloak, &plans, Some("shared")).unwrap().name_any(),
            "p1"
        );
        assert!(pick_plan(&keycloak, &plans, Some("other")).is_err());

        let no_default = vec![plan("p1", "shared", "kc-class")];
        assert_eq!(
            pick_plan(&keycloak, &no_default, None).unwrap().name_any(),
            "p1"
        );
        assert!(pick_plan(&keycloak, &[], None).is_err());
    }

    #[tokio::test]
    async fn instances_filtered_by_service() {
        let mut catalog = MockCatalogApi::new();
        catalog.expect_list_service_instances().returning(|| {
            Ok(vec![
                instance("keycloak-a", "keycloak", "keycloak"),
                instance("sync-a", "fh-sync-server", "fh-sync-server"),
            ])
        });

        let apis = Apis::mocked(MockClusterApi::new(), catalog, MockMobileClientApi::new());
        let instances = list_instances(&apis, "keycloak").await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].name_any(), "keycloak-a");
    }

    fn provisioning_catalog() -> MockCatalogApi {
        let mut catalog = MockCatalogApi::new();
        catalog.expect_list_service_classes().returning(|| {
            Ok(vec![
                class("kc-class", "keycloak", &["mobile-service"]),
                class("db-class", "postgresql", &["database"]),
            ])
        });
        catalog
            .expect_list_service_plans()
            .returning(|| Ok(vec![plan("p2", "default", "kc-class")]));
        catalog
            .expect_create_service_instance()
            .withf(|instance| {
                let labels = instance.labels();
                instance.metadata.generate_name.as_deref() == Some("keycloak-")
                    && labels["serviceName"] == "keycloak"
                    && labels.contains_key("mobile.k8s.io/provision-id")
                    && instance.spec.cluster_service_plan_external_name == "default"
                    && instance.spec.parameters == Some(json!({ "realm": "myproject" }))
            })
            .times(1)
            .returning(|_| Ok(instance("keycloak-x8f2k", "keycloak", "keycloak")));
        catalog
    }

    fn with_ready(status: &str) -> mobile_crds::ServiceInstance {
        let mut instance = instance("keycloak-x8f2k", "keycloak", "keycloak");
        instance.status = Some(ServiceInstanceStatus {
            conditions: vec![Condition {
                type_: "Ready".to_string(),
                status: status.to_string(),
                ..Condition::default()
            }],
            ..ServiceInstanceStatus::default()
        });
        instance
    }

    fn options(wait: bool) -> ProvisionOptions {
        ProvisionOptions {
            params: parse_params(&["realm=myproject".to_string()]).unwrap(),
            wait,
            timeout: Some(Duration::from_secs(5)),
            ..ProvisionOptions::default()
        }
    }

    #[tokio::test]
    async fn provision_without_waiting() {
        let mut catalog = provisioning_catalog();
        catalog.expect_watch_service_instances().never();

        let apis = Apis::mocked(MockClusterApi::new(), catalog, MockMobileClientApi::new());
        let created = create_instance(&apis, "keycloak", options(false), future::pending())
            .await
            .unwrap();
        assert_eq!(created.name_any(), "keycloak-x8f2k");
    }

    #[tokio::test]
    async fn provision_waits_for_ready() {
        let mut catalog = provisioning_catalog();
        catalog
            .expect_watch_service_instances()
            .withf(|selector| selector.starts_with("mobile.k8s.io/provision-id="))
            .times(1)
            .returning(|_| {
                stream::iter(vec![
                    Ok(with_ready("False")),
                    Ok(with_ready("Unknown")),
                    Ok(with_ready("True")),
                ])
                .chain(stream::pending())
                .boxed()
            });

        let apis = Apis::mocked(MockClusterApi::new(), catalog, MockMobileClientApi::new());
        let ready = create_instance(&apis, "keycloak", options(true), future::pending())
            .await
            .unwrap();
        assert!(ready.is_ready());
    }

    #[tokio::test]
    async fn unknown_service_is_rejected() {
        let mut catalog = MockCatalogApi::new();
        catalog
            .expect_list_service_classes()
            .returning(|| Ok(vec![class("db-class", "postgresql", &["database"])]));
        catalog.expect_create_service_instance().never();

        let apis = Apis::mocked(MockClusterApi::new(), catalog, MockMobileClientApi::new());
        let err = create_instance(&apis, "postgresql", options(true), future::pending())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
