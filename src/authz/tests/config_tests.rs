//! Configuration file loading tests

use recloak_authz::{
    load_config, AuthzError, EnforcementMode, Engine, IntrospectionMode, PolicySpec,
};
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

const YAML_CONFIG: &str = r#"
authz:
  pathSeparator: "/"
  enforcementMode: enforcing
  introspection: always
  debug: true
  clientID: my-app
  policies:
    - name: authenticated
      description: Any signed-in user
      expression: InRealmRole("user")
    - name: owner
      expression: "@authenticated && Claims.sub == Request.ownerId"
  resources:
    - name: documents
      displayName: Documents
      policy: authenticated
      children:
        - name: read
        - name: update
          policy: owner
        - name: delete
          policy:
            name: editors
            expression: InRole("editor")
"#;

fn write_config(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_yaml_config() {
    let file = write_config(".yaml", YAML_CONFIG);
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.enforcement_mode, EnforcementMode::Enforcing);
    assert_eq!(config.introspection_mode, IntrospectionMode::Always);
    assert!(config.debug);
    assert_eq!(config.client_id, "my-app");
    assert_eq!(config.policies.len(), 2);
    assert_eq!(config.resources[0].children.len(), 3);
    assert!(matches!(
        &config.resources[0].children[2].policy,
        Some(PolicySpec::Inline(policy)) if policy.name == "editors"
    ));
}

#[test]
fn test_engine_from_yaml_file() {
    let file = write_config(".yml", YAML_CONFIG);
    let engine = Engine::from_file(file.path()).unwrap();

    let mut paths: Vec<_> = engine.paths().collect();
    paths.sort_unstable();
    assert_eq!(
        paths,
        vec![
            "documents",
            "documents/delete",
            "documents/read",
            "documents/update"
        ]
    );
    assert_eq!(
        engine.policies().get("owner").unwrap().expression,
        r#"(InRealmRole("user")) && Claims.sub == Request.ownerId"#
    );

    let user: recloak_authz::Claims = serde_json::from_value(json!({
        "sub": "u-1",
        "realm_access": { "roles": ["user"] }
    }))
    .unwrap();

    assert!(engine.authorize("documents/read", Some(&user), &json!({})).is_ok());
    assert!(engine
        .authorize("documents/update", Some(&user), &json!({"ownerId": "u-1"}))
        .is_ok());
    assert!(engine
        .authorize("documents/update", Some(&user), &json!({"ownerId": "u-2"}))
        .is_err());
    assert!(engine.authorize("documents/delete", Some(&user), &json!({})).is_err());
}

#[test]
fn test_load_json_config() {
    let contents = json!({
        "authz": {
            "enforcementMode": "permissive",
            "policies": [{ "name": "allow-all", "expression": "true" }],
            "resources": [{ "name": "health", "policy": "allow-all" }]
        }
    });
    let file = write_config(".json", &contents.to_string());

    let engine = Engine::from_file(file.path()).unwrap();
    assert_eq!(engine.enforcement_mode(), EnforcementMode::Permissive);
    assert!(engine.authorize("health", None, &json!({})).is_ok());
    assert!(engine.authorize("unconfigured", None, &json!({})).is_ok());
}

#[test]
fn test_unsupported_extension() {
    let file = write_config(".toml", "[authz]\n");
    assert!(matches!(
        load_config(file.path()),
        Err(AuthzError::UnsupportedConfigFormat(ext)) if ext == "toml"
    ));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_config(dir.path().join("missing.yaml"));
    assert!(matches!(result, Err(AuthzError::Io(_))));
}

#[test]
fn test_invalid_enforcement_mode_in_file() {
    let file = write_config(".yaml", "authz:\n  enforcementMode: strict\n");
    assert!(matches!(load_config(file.path()), Err(AuthzError::Yaml(_))));
}

#[test]
fn test_broken_policy_aborts_engine_build() {
    let file = write_config(
        ".yaml",
        r#"
authz:
  policies:
    - name: self
      expression: "@self"
"#,
    );

    assert!(matches!(
        Engine::from_file(file.path()),
        Err(AuthzError::SelfInclude(name)) if name == "self"
    ));
}
