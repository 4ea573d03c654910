use std::collections::BTreeMap;

use mobile_crds::{ClientType, MobileClient, MobileClientSpec};
use tracing::info;

use crate::{
    apis::Apis,
    error::{Error, Result, ResultExt as _},
};

pub const ICON_LABEL: &str = "icon";

/// Build a new [`MobileClient`] with a freshly generated API key.
///
/// Fails if `client_type` is not one of the supported platforms.
pub fn new_client(
    namespace: &str,
    name: &str,
    client_type: &str,
    app_identifier: Option<String>,
) -> Result<MobileClient> {
    if name.is_empty() {
        return Err(Error::validation("a client name is required"));
    }

    let client_type: ClientType = client_type
        .parse()
        .map_err(|err: mobile_crds::UnknownClientType| Error::validation(err.to_string()))?;

    let mut client = MobileClient::new(
        &MobileClient::resource_name(name, client_type),
        MobileClientSpec {
            name: name.to_string(),
            api_key: uuid::Uuid::new_v4().to_string(),
            client_type: client_type.to_string(),
            app_identifier,
        },
    );
    client.metadata.namespace = Some(namespace.to_string());
    client.metadata.labels = Some(BTreeMap::from([(
        ICON_LABEL.to_string(),
        client_type.icon().to_string(),
    )]));

    Ok(client)
}

pub async fn create_client(
    apis: &Apis,
    name: &str,
    client_type: &str,
    app_identifier: Option<String>,
) -> Result<MobileClient> {
    let client = new_client(&apis.namespace, name, client_type, app_identifier)?;

    let created = apis
        .mobile
        .create_client(&client)
        .await
        .context(|| format!("failed to create mobile client {name}"))?;
    info!("created mobile client {name} ({client_type})");

    Ok(created)
}

pub async fn get_client(apis: &Apis, id: &str) -> Result<MobileClient> {
    apis.mobile
        .get_client(id)
        .await
        .context(|| format!("failed to get mobile client {id}"))
}

pub async fn list_clients(apis: &Apis) -> Result<Vec<MobileClient>> {
    apis.mobile
        .list_clients()
        .await
        .context(|| format!("failed to list mobile clients in {}", apis.namespace))
}

pub async fn delete_client(apis: &Apis, id: &str) -> Result<()> {
    apis.mobile
        .delete_client(id)
        .await
        .context(|| format!("failed to delete mobile client {id}"))?;
    info!("deleted mobile client {id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use kube::ResourceExt as _;

    use super::{create_client, new_client};
    use crate::{
        apis::{Apis, MockCatalogApi, MockClusterApi, MockMobileClientApi},
        error::Error,
        testing::conflict,
    };

    #[test]
    fn icons_follow_client_type() {
        for (client_type, icon) in [
            ("android", "fa-android"),
            ("iOS", "fa-apple"),
            ("cordova", "icon-cordova"),
        ] {
            let client = new_client("myproject", "myapp", client_type, None).unwrap();
            assert_eq!(client.labels()["icon"], icon);
            assert_eq!(client.spec.client_type, client_type);
        }
    }

    #[test]
    fn resource_name_and_api_key() {
        let first = new_client("myproject", "myapp", "iOS", None).unwrap();
        let second = new_client("myproject", "myapp", "iOS", None).unwrap();

        assert_eq!(first.name_any(), "myapp-ios");
        assert_eq!(first.namespace().as_deref(), Some("myproject"));
        assert!(uuid::Uuid::parse_str(&first.spec.api_key).is_ok());
        assert_ne!(first.spec.api_key, second.spec.api_key);
    }

    #[tokio::test]
    async fn unknown_client_type_never_reaches_the_api() {
        let mut mobile = MockMobileClientApi::new();
        mobile.expect_create_client().never();

        let apis = Apis::mocked(MockClusterApi::new(), MockCatalogApi::new(), mobile);
        let err = create_client(&apis, "myapp", "windows", None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("windows"));
    }

    #[tokio::test]
    async fn creates_client() {
        let mut mobile = MockMobileClientApi::new();
        mobile
            .expect_create_client()
            .withf(|client| {
                client.name_any() == "myapp-cordova"
                    && client.spec.app_identifier.as_deref() == Some("org.example.myapp")
            })
            .times(1)
            .returning(|client| Ok(client.clone()));

        let apis = Apis::mocked(MockClusterApi::new(), MockCatalogApi::new(), mobile);
        let client = create_client(
            &apis,
            "myapp",
            "cordova",
            Some("org.example.myapp".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(client.labels()["icon"], "icon-cordova");
    }

    #[tokio::test]
    async fn duplicate_client_surfaces_conflict() {
        let mut mobile = MockMobileClientApi::new();
        mobile
            .expect_create_client()
            .returning(|client| Err(conflict(&client.name_any())));

        let apis = Apis::mocked(MockClusterApi::new(), MockCatalogApi::new(), mobile);
        let err = create_client(&apis, "myapp", "android", None)
            .await
            .unwrap_err();

        assert!(err
            .to_string()
            .starts_with("failed to create mobile client myapp: "));
    }
}
