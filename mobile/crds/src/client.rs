use std::{fmt, str::FromStr};

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A mobile application registered in a namespace, along with the
/// API key issued to it.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[kube(
    group = "mobile.k8s.io",
    version = "v1alpha1",
    kind = "MobileClient",
    namespaced,
    shortname = "mc"
)]
#[kube(printcolumn = r#"{"name":"name", "jsonPath": ".spec.name", "type": "string"}"#)]
#[kube(printcolumn = r#"{"name":"type", "jsonPath": ".spec.clientType", "type": "string"}"#)]
#[serde(rename_all = "camelCase")]
pub struct MobileClientSpec {
    pub name: String,
    pub api_key: String,
    pub client_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_identifier: Option<String>,
}

/// The platforms a [`MobileClient`] can target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientType {
    Android,
    Ios,
    Cordova,
}

impl ClientType {
    pub const ALL: [ClientType; 3] = [ClientType::Android, ClientType::Ios, ClientType::Cordova];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Android => "android",
            ClientType::Ios => "iOS",
            ClientType::Cordova => "cordova",
        }
    }

    /// Icon shown for clients of this type in the web console.
    pub fn icon(&self) -> &'static str {
        match self {
            ClientType::Android => "fa-android",
            ClientType::Ios => "fa-apple",
            ClientType::Cordova => "icon-cordova",
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownClientType(pub String);

impl fmt::Display for UnknownClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown client type {:?}, expected one of: android, iOS, cordova",
            self.0
        )
    }
}

impl std::error::Error for UnknownClientType {}

impl FromStr for ClientType {
    type Err = UnknownClientType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClientType::ALL
            .into_iter()
            .find(|client_type| client_type.as_str() == s)
            .ok_or_else(|| UnknownClientType(s.to_string()))
    }
}

impl MobileClient {
    /// Resource name for a client, unique per name and client type.
    pub fn resource_name(name: &str, client_type: ClientType) -> String {
        format!("{}-{}", name, client_type.as_str().to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use kube::{CustomResourceExt as _, Resource as _};

    use super::{ClientType, MobileClient};

    #[test]
    fn client_types_parse_exactly() {
        assert_eq!("android".parse::<ClientType>(), Ok(ClientType::Android));
        assert_eq!("iOS".parse::<ClientType>(), Ok(ClientType::Ios));
        assert_eq!("cordova".parse::<ClientType>(), Ok(ClientType::Cordova));

        assert!("ios".parse::<ClientType>().is_err());
        assert!("windows".parse::<ClientType>().is_err());
        assert!("".parse::<ClientType>().is_err());
    }

    #[test]
    fn icons() {
        assert_eq!(ClientType::Android.icon(), "fa-android");
        assert_eq!(ClientType::Ios.icon(), "fa-apple");
        assert_eq!(ClientType::Cordova.icon(), "icon-cordova");
    }

    #[test]
    fn resource_name_lowercases_client_type() {
        assert_eq!(
            MobileClient::resource_name("myapp", ClientType::Ios),
            "myapp-ios"
        );
        assert_eq!(
            MobileClient::resource_name("myapp", ClientType::Android),
            "myapp-android"
        );
    }

    #[test]
    fn crd_document() {
        let crd = serde_yaml::to_string(&MobileClient::crd()).unwrap();

        assert!(crd.contains("name: mobileclients.mobile.k8s.io"));
        assert!(crd.contains("kind: MobileClient"));
        assert!(crd.contains("apiKey"));
        assert_eq!(MobileClient::api_version(&()), "mobile.k8s.io/v1alpha1");
    }
}
