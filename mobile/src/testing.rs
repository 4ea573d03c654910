//! Fixtures shared by the unit tests.

use std::collections::BTreeMap;

use k8s_openapi::{api::core::v1::Secret, ByteString};
use kube::core::ObjectMeta;
use mobile_crds::{ServiceInstance, ServiceInstanceSpec, SERVICE_NAME_LABEL};

use crate::service::Service;

pub fn not_found(name: &str) -> kube::Error {
    kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{name:?} not found"),
        reason: "NotFound".to_string(),
        code: 404,
    })
}

pub fn conflict(name: &str) -> kube::Error {
    kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{name:?} already exists"),
        reason: "AlreadyExists".to_string(),
        code: 409,
    })
}

pub fn secret(name: &str, data: &[(&str, &str)], labels: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("myproject".to_string()),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..ObjectMeta::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        ..Secret::default()
    }
}

pub fn service(id: &str, name: &str) -> Service {
    Service {
        id: id.to_string(),
        name: name.to_string(),
        display_name: name.to_string(),
        namespace: "myproject".to_string(),
        ..Service::default()
    }
}

/// A service instance of `class` whose `serviceName` label points at
/// `service_name`.
pub fn instance(name: &str, class: &str, service_name: &str) -> ServiceInstance {
    let mut instance = ServiceInstance::new(
        name,
        ServiceInstanceSpec {
            cluster_service_class_external_name: class.to_string(),
            cluster_service_plan_external_name: "default".to_string(),
            ..ServiceInstanceSpec::default()
        },
    );
    instance.metadata.namespace = Some("myproject".to_string());
    instance.metadata.labels = Some(BTreeMap::from([(
        SERVICE_NAME_LABEL.to_string(),
        service_name.to_string(),
    )]));
    instance
}
