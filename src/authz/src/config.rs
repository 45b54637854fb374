//! Authorization configuration and loading
//!
//! The configuration document has a single `authz` section:
//!
//! ```yaml
//! authz:
//!   pathSeparator: "/"
//!   enforcementMode: enforcing   # enforcing | permissive | disabled
//!   introspection: never         # never | always
//!   debug: false
//!   clientID: my-app
//!   policies:
//!     - name: admins
//!       expression: InRealmRole("admin")
//!   resources:
//!     - name: users
//!       policy: admins
//!       children:
//!         - name: list
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::{AuthzError, Result};
use crate::types::{Policy, Resource};

/// Default separator between resource names in a path
pub const DEFAULT_PATH_SEPARATOR: &str = "/";

/// How to treat paths that have no compiled policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EnforcementMode {
    /// Deny paths without a policy
    #[default]
    Enforcing = 0,
    /// Allow paths without a policy
    Permissive = 1,
    /// Skip evaluation entirely, every request is allowed
    Disabled = 2,
}

impl EnforcementMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enforcing => "enforcing",
            Self::Permissive => "permissive",
            Self::Disabled => "disabled",
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Permissive,
            2 => Self::Disabled,
            _ => Self::Enforcing,
        }
    }
}

/// Whether to verify tokens remotely before evaluating policies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum IntrospectionMode {
    /// Decode and verify tokens locally only
    #[default]
    Never,
    /// Ask the identity provider whether the token is active on every request
    Always,
}

impl IntrospectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Always => "always",
        }
    }
}

impl FromStr for EnforcementMode {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "enforcing" => Ok(Self::Enforcing),
            "permissive" => Ok(Self::Permissive),
            "disabled" => Ok(Self::Disabled),
            _ => Err(AuthzError::InvalidConfig(format!(
                "invalid enforcement mode: {s}"
            ))),
        }
    }
}

impl FromStr for IntrospectionMode {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "never" => Ok(Self::Never),
            "always" => Ok(Self::Always),
            _ => Err(AuthzError::InvalidConfig(format!(
                "invalid introspection mode: {s}"
            ))),
        }
    }
}

impl fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for IntrospectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deserialize a mode from an optional string; `null` and `""` give the default
fn deserialize_mode<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr<Err = AuthzError>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(de::Error::custom)
}

impl<'de> Deserialize<'de> for EnforcementMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserialize_mode(deserializer)
    }
}

impl<'de> Deserialize<'de> for IntrospectionMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserialize_mode(deserializer)
    }
}

impl Serialize for EnforcementMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl Serialize for IntrospectionMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

fn default_path_separator() -> String {
    DEFAULT_PATH_SEPARATOR.to_string()
}

/// The `authz` configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthzConfig {
    /// Separator between resource names in a path
    #[serde(default = "default_path_separator")]
    pub path_separator: String,

    #[serde(default)]
    pub enforcement_mode: EnforcementMode,

    #[serde(default, rename = "introspection")]
    pub introspection_mode: IntrospectionMode,

    /// Log every compiled path and its expression on engine build
    #[serde(default)]
    pub debug: bool,

    /// Client whose roles `InRole(...)` checks
    #[serde(default, rename = "clientID")]
    pub client_id: String,

    /// Flat pool of named policies
    #[serde(default)]
    pub policies: Vec<Policy>,

    /// Resource tree roots
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            path_separator: default_path_separator(),
            enforcement_mode: EnforcementMode::default(),
            introspection_mode: IntrospectionMode::default(),
            debug: false,
            client_id: String::new(),
            policies: Vec::new(),
            resources: Vec::new(),
        }
    }
}

impl AuthzConfig {
    /// Parse a YAML document with a top-level `authz` key
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        parse_config(contents, ConfigFormat::Yaml)
    }

    /// Parse a JSON document with a top-level `authz` key
    pub fn from_json_str(contents: &str) -> Result<Self> {
        parse_config(contents, ConfigFormat::Json)
    }
}

/// Static settings visible to policy expressions as `Config`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    pub path_separator: String,

    #[serde(rename = "clientID")]
    pub client_id: String,

    pub debug: bool,

    /// Whether the enforcer introspects tokens before evaluation
    pub introspection: IntrospectionMode,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            path_separator: default_path_separator(),
            client_id: String::new(),
            debug: false,
            introspection: IntrospectionMode::default(),
        }
    }
}

impl EngineSettings {
    /// Extract and validate the static settings of a configuration
    pub fn from_config(config: &AuthzConfig) -> Result<Self> {
        if config.path_separator.is_empty() {
            return Err(AuthzError::InvalidConfig(
                "pathSeparator must not be empty".to_string(),
            ));
        }

        Ok(Self {
            path_separator: config.path_separator.clone(),
            client_id: config.client_id.clone(),
            debug: config.debug,
            introspection: config.introspection_mode,
        })
    }
}

/// On-disk configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match ext.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(AuthzError::UnsupportedConfigFormat(ext)),
        }
    }
}

#[derive(Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    authz: AuthzConfig,
}

/// Parse a configuration document (with its top-level `authz` key)
pub fn parse_config(contents: &str, format: ConfigFormat) -> Result<AuthzConfig> {
    let document: ConfigDocument = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(contents)?,
        ConfigFormat::Json => serde_json::from_str(contents)?,
    };

    Ok(document.authz)
}

/// Load the configuration from a `.yaml`, `.yml` or `.json` file
pub fn load_config(path: impl AsRef<Path>) -> Result<AuthzConfig> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let contents = std::fs::read_to_string(path)?;

    let config = parse_config(&contents, format)?;

    debug!(
        path = %path.display(),
        policies = config.policies.len(),
        resources = config.resources.len(),
        mode = %config.enforcement_mode,
        "Loaded authorization config"
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PolicySpec;

    #[test]
    fn test_decode_enforcement_mode() {
        let cases = [
            ("\"\"", Some(EnforcementMode::Enforcing)),
            ("~", Some(EnforcementMode::Enforcing)),
            ("enforcing", Some(EnforcementMode::Enforcing)),
            ("permissive", Some(EnforcementMode::Permissive)),
            ("Disabled", Some(EnforcementMode::Disabled)),
            ("permissivee", None),
        ];

        for (yaml, expected) in cases {
            let actual = serde_yaml::from_str::<EnforcementMode>(yaml).ok();
            assert_eq!(actual, expected, "decoding {yaml:?}");
        }
    }

    #[test]
    fn test_decode_introspection_mode() {
        assert_eq!(
            serde_yaml::from_str::<IntrospectionMode>("always").unwrap(),
            IntrospectionMode::Always
        );
        assert_eq!(
            serde_yaml::from_str::<IntrospectionMode>("never").unwrap(),
            IntrospectionMode::Never
        );
        assert!(serde_yaml::from_str::<IntrospectionMode>("sometimes").is_err());
    }

    #[test]
    fn test_mode_display_roundtrips_through_parse() {
        for mode in [
            EnforcementMode::Enforcing,
            EnforcementMode::Permissive,
            EnforcementMode::Disabled,
        ] {
            assert_eq!(mode.to_string().parse::<EnforcementMode>().unwrap(), mode);
            assert_eq!(EnforcementMode::from_u8(mode as u8), mode);
        }
    }

    #[test]
    fn test_decode_config_from_yaml() {
        let config = parse_config(
            r#"
---
authz:
  pathSeparator: "."
  enforcementMode: permissive
  introspection: always
  clientID: my-app
  policies:
    - name: first-policy
      description: The first policy in this test
      expression: "true"
  resources:
    - name: first-resource
      displayName: The first resource in this test
      policy: first-policy
"#,
            ConfigFormat::Yaml,
        )
        .unwrap();

        let expected = AuthzConfig {
            path_separator: ".".into(),
            enforcement_mode: EnforcementMode::Permissive,
            introspection_mode: IntrospectionMode::Always,
            debug: false,
            client_id: "my-app".into(),
            policies: vec![Policy::new("first-policy", "true")
                .with_description("The first policy in this test")],
            resources: vec![Resource::new("first-resource")
                .with_display_name("The first resource in this test")
                .with_policy(PolicySpec::Ref("first-policy".into()))],
        };

        assert_eq!(config, expected);
    }

    #[test]
    fn test_defaults_apply_to_missing_fields() {
        let config = parse_config("authz: {}", ConfigFormat::Yaml).unwrap();
        assert_eq!(config, AuthzConfig::default());
        assert_eq!(config.path_separator, DEFAULT_PATH_SEPARATOR);
    }

    #[test]
    fn test_invalid_mode_is_fatal() {
        let result = parse_config("authz:\n  enforcementMode: strict\n", ConfigFormat::Yaml);
        assert!(matches!(result, Err(AuthzError::Yaml(_))));

        let result = AuthzConfig::from_json_str(r#"{"authz": {"introspection": "maybe"}}"#);
        assert!(matches!(result, Err(AuthzError::Json(_))));
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.YAML")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")).unwrap(), ConfigFormat::Json);
        assert!(matches!(
            ConfigFormat::from_path(Path::new("a.toml")),
            Err(AuthzError::UnsupportedConfigFormat(_))
        ));
    }

    #[test]
    fn test_engine_settings_reject_empty_separator() {
        let config = AuthzConfig {
            path_separator: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            EngineSettings::from_config(&config),
            Err(AuthzError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_engine_settings_serialize_like_config() {
        let settings = EngineSettings {
            client_id: "app".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(value["clientID"], "app");
        assert_eq!(value["pathSeparator"], "/");
        assert_eq!(value["introspection"], "never");
    }

    #[test]
    fn test_engine_settings_carry_introspection_mode() {
        let config = AuthzConfig::from_yaml_str("authz:\n  introspection: Always\n").unwrap();
        let settings = EngineSettings::from_config(&config).unwrap();
        assert_eq!(settings.introspection, IntrospectionMode::Always);
    }
}
