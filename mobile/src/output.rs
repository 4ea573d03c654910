//! Rendering command results, as JSON or as aligned tables.

use std::{collections::HashMap, io::Write, str::FromStr};

use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Table,
}

impl FromStr for Format {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Format::Json),
            "table" => Ok(Format::Table),
            _ => Err(()),
        }
    }
}

/// A table column, filled from each row by a JSON pointer.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub header: &'static str,
    pub pointer: &'static str,
}

const fn column(header: &'static str, pointer: &'static str) -> Column {
    Column { header, pointer }
}

pub type Renderer = Box<dyn Fn(&Value, &mut dyn Write) -> std::io::Result<()>>;

/// Renderers by command and format, built once at startup.
#[derive(Default)]
pub struct OutputRegistry {
    renderers: HashMap<(String, Format), Renderer>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: &str, format: Format, renderer: Renderer) {
        self.renderers.insert((command.to_string(), format), renderer);
    }

    /// Register JSON output and a table with `columns` for `command`.
    pub fn register_table(&mut self, command: &str, columns: &'static [Column]) {
        self.register(command, Format::Json, Box::new(render_json));
        self.register(
            command,
            Format::Table,
            Box::new(move |value: &Value, out: &mut dyn Write| {
                render_table(columns, value, out)
            }),
        );
    }

    pub fn render(
        &self,
        command: &str,
        format: &str,
        value: &Value,
        out: &mut dyn Write,
    ) -> Result<()> {
        let unknown = || Error::UnknownOutput {
            command: command.to_string(),
            format: format.to_string(),
        };

        let format = format.parse::<Format>().map_err(|_| unknown())?;
        let renderer = self
            .renderers
            .get(&(command.to_string(), format))
            .ok_or_else(unknown)?;

        renderer(value, out)?;
        Ok(())
    }

    /// Renderers for every command that prints a result.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register_table("get clients", CLIENT_COLUMNS);
        registry.register_table("get client", CLIENT_COLUMNS);
        registry.register_table("create client", CLIENT_COLUMNS);

        registry.register_table("get clientconfig", CLIENT_CONFIG_COLUMNS);
        registry.register_table("get serviceconfigs", SERVICE_CONFIG_COLUMNS);
        registry.register_table("get serviceconfig", SERVICE_CONFIG_COLUMNS);
        registry.register_table("create serviceconfig", SERVICE_COLUMNS);

        registry.register_table("get integrations", INTEGRATION_COLUMNS);
        registry.register_table("get integration", BINDING_COLUMNS);

        registry.register_table("get services", SERVICE_CLASS_COLUMNS);
        registry.register_table("get serviceinstances", SERVICE_INSTANCE_COLUMNS);
        registry.register_table("create serviceinstance", SERVICE_INSTANCE_COLUMNS);

        registry.register_table("get clientbuilds", BUILD_CONFIG_COLUMNS);
        registry.register_table("get clientbuild", BUILD_CONFIG_COLUMNS);
        registry.register_table("create clientbuild", BUILD_CONFIG_COLUMNS);
        registry.register_table("start clientbuild", BUILD_COLUMNS);
        registry.register_table("stop clientbuild", BUILD_COLUMNS);

        registry
    }
}

const CLIENT_COLUMNS: &[Column] = &[
    column("ID", "/metadata/name"),
    column("NAME", "/spec/name"),
    column("CLIENTTYPE", "/spec/clientType"),
    column("APPIDENTIFIER", "/spec/appIdentifier"),
];

const CLIENT_CONFIG_COLUMNS: &[Column] = &[
    column("CLIENTID", "/clientId"),
    column("NAMESPACE", "/namespace"),
    column("CLUSTER", "/clusterName"),
];

const SERVICE_CONFIG_COLUMNS: &[Column] = &[
    column("ID", "/id"),
    column("NAME", "/name"),
    column("TYPE", "/type"),
    column("URL", "/url"),
];

const SERVICE_COLUMNS: &[Column] = &[
    column("ID", "/id"),
    column("NAME", "/name"),
    column("DISPLAYNAME", "/displayName"),
    column("HOST", "/host"),
    column("EXTERNAL", "/external"),
];

const INTEGRATION_COLUMNS: &[Column] = &[
    column("CONSUMER", "/consumer"),
    column("PROVIDER", "/provider"),
    column("ENABLED", "/enabled"),
    column("MOUNTPATH", "/mountPath"),
];

const BINDING_COLUMNS: &[Column] = &[
    column("NAME", "/metadata/name"),
    column("INSTANCE", "/spec/instanceRef/name"),
    column("SECRET", "/spec/secretName"),
];

const SERVICE_CLASS_COLUMNS: &[Column] = &[
    column("ID", "/metadata/name"),
    column("NAME", "/spec/externalName"),
    column("BINDABLE", "/spec/bindable"),
    column("DESCRIPTION", "/spec/description"),
];

const SERVICE_INSTANCE_COLUMNS: &[Column] = &[
    column("ID", "/metadata/name"),
    column("SERVICE", "/spec/clusterServiceClassExternalName"),
    column("PLAN", "/spec/clusterServicePlanExternalName"),
    column("READY", "/status/conditions/0/status"),
];

const BUILD_CONFIG_COLUMNS: &[Column] = &[
    column("NAME", "/metadata/name"),
    column("CLIENTID", "/metadata/labels/mobile-client-id"),
    column("GITURL", "/spec/source/git/uri"),
    column("REF", "/spec/source/git/ref"),
];

const BUILD_COLUMNS: &[Column] = &[
    column("NAME", "/metadata/name"),
    column("PHASE", "/status/phase"),
];

fn render_json(value: &Value, out: &mut dyn Write) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Arrays render one row per element, anything else as a single row.
pub fn build_table(columns: &[Column], value: &Value) -> String {
    let rows = match value {
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        other => vec![other],
    };

    let cells = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| cell(row.pointer(column.pointer)))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    // Every column is as wide as its widest cell, header included.
    let widths = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            cells
                .iter()
                .map(|row| row[i].len())
                .chain(std::iter::once(column.header.len()))
                .max()
                .unwrap_or_default()
        })
        .collect::<Vec<_>>();

    let format_row = |row: Vec<&str>| {
        row.iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("   ")
            .trim_end()
            .to_string()
    };

    std::iter::once(format_row(columns.iter().map(|c| c.header).collect()))
        .chain(
            cells
                .iter()
                .map(|row| format_row(row.iter().map(String::as_str).collect())),
        )
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_table(columns: &[Column], value: &Value, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "{}", build_table(columns, value))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{build_table, OutputRegistry, CLIENT_COLUMNS, INTEGRATION_COLUMNS};
    use crate::error::Error;

    #[test]
    fn client_table() {
        let clients = json!([
            {
                "metadata": { "name": "myapp-android" },
                "spec": { "name": "myapp", "clientType": "android", "apiKey": "k" }
            },
            {
                "metadata": { "name": "shop-ios" },
                "spec": {
                    "name": "shop",
                    "clientType": "iOS",
                    "apiKey": "k",
                    "appIdentifier": "org.example.shop"
                }
            }
        ]);

        assert_eq!(
            build_table(CLIENT_COLUMNS, &clients),
            indoc::indoc! { r#"
            ID              NAME    CLIENTTYPE   APPIDENTIFIER
            myapp-android   myapp   android
            shop-ios        shop    iOS          org.example.shop"#
            }
        );
    }

    #[test]
    fn single_object_and_non_string_cells() {
        let integration = json!({
            "consumer": "fh-sync-server",
            "provider": "keycloak",
            "enabled": true,
            "mountPath": "/etc/secrets/keycloak"
        });

        assert_eq!(
            build_table(INTEGRATION_COLUMNS, &integration),
            indoc::indoc! { r#"
            CONSUMER         PROVIDER   ENABLED   MOUNTPATH
            fh-sync-server   keycloak   true      /etc/secrets/keycloak"#
            }
        );
    }

    #[test]
    fn empty_list_renders_headers() {
        assert_eq!(
            build_table(INTEGRATION_COLUMNS, &json!([])),
            "CONSUMER   PROVIDER   ENABLED   MOUNTPATH"
        );
    }

    #[test]
    fn json_output() {
        let registry = OutputRegistry::with_defaults();
        let mut out = Vec::new();

        registry
            .render("get clients", "json", &json!([{ "a": 1 }]), &mut out)
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[\n  {\n    \"a\": 1\n  }\n]\n"
        );
    }

    #[test]
    fn unknown_outputs() {
        let registry = OutputRegistry::with_defaults();
        let mut out = Vec::new();

        let err = registry
            .render("get clients", "yaml", &json!([]), &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownOutput { .. }));

        let err = registry
            .render("get nothing", "table", &json!([]), &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownOutput { .. }));
        assert!(out.is_empty());
    }
}
