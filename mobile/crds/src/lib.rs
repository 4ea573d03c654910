//! Typed Kubernetes resources used by the `mobile` plugin.
//!
//! Only [`MobileClient`] is a custom resource owned by this project. The
//! remaining kinds belong to the service catalog, the pod preset admission
//! controller and OpenShift builds, and are declared here so they can be
//! used with [`kube::Api`] like any other typed resource.

pub mod build;
pub mod catalog;
pub mod client;
pub mod pod_preset;

pub use build::{
    Build, BuildConfig, BuildConfigSpec, BuildSource, BuildSpec, BuildStatus, BuildStrategy,
    GitBuildSource, JenkinsPipelineStrategy,
};
pub use catalog::{
    ClusterServiceClass, ClusterServiceClassSpec, ClusterServicePlan, ClusterServicePlanSpec,
    Condition, LocalObjectReference, ServiceBinding, ServiceBindingSpec, ServiceBindingStatus,
    ServiceInstance, ServiceInstanceSpec, ServiceInstanceStatus,
};
pub use client::{ClientType, MobileClient, MobileClientSpec, UnknownClientType};
pub use pod_preset::{PodPreset, PodPresetSpec};

/// Label selecting secrets which describe a mobile service.
pub const MOBILE_SERVICE_LABEL: &str = "mobile";

/// Value of [`MOBILE_SERVICE_LABEL`] on discovered services.
pub const MOBILE_SERVICE_ENABLED: &str = "enabled";

/// Label naming the service (and its secret) behind a service instance.
pub const SERVICE_NAME_LABEL: &str = "serviceName";

/// Label attached to every instance we provision, holding a one-off id
/// used to watch for the instance becoming ready.
pub const PROVISION_ID_LABEL: &str = "mobile.k8s.io/provision-id";

/// Tag carried by service classes that are offered as mobile services.
pub const MOBILE_SERVICE_TAG: &str = "mobile-service";

/// Label value marking a provider as enabled on a consumer's pod template.
pub const INTEGRATION_ENABLED: &str = "enabled";

/// Label on build configs created for mobile clients.
pub const CLIENT_BUILD_LABEL: &str = "mobile-client-build";

/// Label on build configs referencing the [`MobileClient`] they build.
pub const CLIENT_ID_LABEL: &str = "mobile-client-id";

/// Label OpenShift sets on builds, naming the build config they came from.
pub const BUILD_CONFIG_LABEL: &str = "openshift.io/build-config.name";
