//! # Desired-State Resolution
//!
//! Merges the catalog entry selected by `(security, version)` with the
//! override templates carried in the `AdditionalDeployments` and
//! `AdditionalServices` annotations.
//!
//! Ordering: catalog components first, then one component per additional
//! deployment (with the same-named additional service attached), then every
//! additional service that matched no deployment. Annotation order is kept.

use crate::config::{Component, ComponentCatalog};
use crate::constants::{ANNOTATION_ADDITIONAL_DEPLOYMENTS, ANNOTATION_ADDITIONAL_SERVICES};
use crate::crd::{DeploymentTemplateSpec, PlatformAdmin, ServiceTemplateSpec};
use k8s_openapi::api::core::v1::ConfigMap;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("annotation {annotation} is not a valid template list: {source}")]
    Decode {
        annotation: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("annotation {annotation} has a template without metadata.name")]
    MissingName { annotation: &'static str },
    #[error("component {name} is declared more than once")]
    DuplicateComponent { name: String },
    #[error("configmap {name} is declared more than once with different content")]
    DuplicateConfigMap { name: String },
    #[error("catalog configmap without metadata.name")]
    UnnamedConfigMap,
}

/// Everything one PlatformAdmin wants to exist
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredState {
    /// Version-level config objects followed by per-component ones, deduplicated by name
    pub config_maps: Vec<ConfigMap>,
    pub components: Vec<Component>,
}

impl DesiredState {
    pub fn config_map_names(&self) -> HashSet<String> {
        self.config_maps
            .iter()
            .filter_map(|cm| cm.metadata.name.clone())
            .collect()
    }

    /// Names of components that expose a Service
    pub fn service_names(&self) -> HashSet<String> {
        self.components
            .iter()
            .filter(|c| c.service.is_some())
            .map(|c| c.name.clone())
            .collect()
    }

    /// Names of components that run a workload
    pub fn workload_names(&self) -> HashSet<String> {
        self.components
            .iter()
            .filter(|c| c.deployment.is_some())
            .map(|c| c.name.clone())
            .collect()
    }
}

/// Compute the desired state of a PlatformAdmin
pub fn resolve(
    catalog: &ComponentCatalog,
    platform_admin: &PlatformAdmin,
) -> Result<DesiredState, ResolveError> {
    let spec = &platform_admin.spec;
    let mut components = catalog.components(spec.security, &spec.version).to_vec();
    components.extend(annotation_components(
        platform_admin.metadata.annotations.as_ref(),
    )?);

    let mut seen = HashSet::new();
    for component in &components {
        if !seen.insert(component.name.as_str()) {
            return Err(ResolveError::DuplicateComponent {
                name: component.name.clone(),
            });
        }
    }

    let config_maps = merge_config_maps(
        catalog.config_maps(spec.security, &spec.version),
        &components,
    )?;

    Ok(DesiredState {
        config_maps,
        components,
    })
}

/// Convert the override annotations into components.
///
/// Absent or blank annotations contribute nothing.
pub fn annotation_components(
    annotations: Option<&BTreeMap<String, String>>,
) -> Result<Vec<Component>, ResolveError> {
    let deployments: Vec<DeploymentTemplateSpec> =
        decode_annotation(annotations, ANNOTATION_ADDITIONAL_DEPLOYMENTS)?;
    let services: Vec<ServiceTemplateSpec> =
        decode_annotation(annotations, ANNOTATION_ADDITIONAL_SERVICES)?;

    // services are keyed by name, a later entry replaces an earlier one
    let mut by_name: Vec<(String, Option<_>)> = Vec::with_capacity(services.len());
    for template in services {
        let name = template
            .metadata
            .name
            .filter(|n| !n.is_empty())
            .ok_or(ResolveError::MissingName {
                annotation: ANNOTATION_ADDITIONAL_SERVICES,
            })?;
        match by_name.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, spec)) => *spec = Some(template.spec),
            None => by_name.push((name, Some(template.spec))),
        }
    }
    let mut services = by_name;

    let mut components = Vec::with_capacity(deployments.len() + services.len());
    for template in deployments {
        let name = template
            .metadata
            .name
            .filter(|n| !n.is_empty())
            .ok_or(ResolveError::MissingName {
                annotation: ANNOTATION_ADDITIONAL_DEPLOYMENTS,
            })?;
        let service = services
            .iter_mut()
            .find(|(service_name, spec)| *service_name == name && spec.is_some())
            .and_then(|(_, spec)| spec.take());
        components.push(Component {
            name,
            config_maps: Vec::new(),
            service,
            deployment: Some(template.spec),
        });
    }

    components.extend(services.into_iter().filter_map(|(name, spec)| {
        spec.map(|spec| Component {
            name,
            config_maps: Vec::new(),
            service: Some(spec),
            deployment: None,
        })
    }));

    Ok(components)
}

fn decode_annotation<T: DeserializeOwned>(
    annotations: Option<&BTreeMap<String, String>>,
    annotation: &'static str,
) -> Result<Vec<T>, ResolveError> {
    match annotations.and_then(|a| a.get(annotation)) {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)
            .map_err(|source| ResolveError::Decode { annotation, source }),
        _ => Ok(Vec::new()),
    }
}

/// Version-level config objects first, then per-component ones.
/// Identical redeclarations collapse; conflicting ones are an error.
fn merge_config_maps(
    version_level: &[ConfigMap],
    components: &[Component],
) -> Result<Vec<ConfigMap>, ResolveError> {
    let mut merged: Vec<ConfigMap> = Vec::new();
    let all = version_level
        .iter()
        .chain(components.iter().flat_map(|c| c.config_maps.iter()));
    for config_map in all {
        let name = config_map
            .metadata
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or(ResolveError::UnnamedConfigMap)?;
        match merged
            .iter()
            .find(|m| m.metadata.name.as_deref() == Some(name))
        {
            Some(existing) if existing == config_map => {}
            Some(_) => {
                return Err(ResolveError::DuplicateConfigMap {
                    name: name.to_string(),
                })
            }
            None => merged.push(config_map.clone()),
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VersionCatalog;
    use crate::crd::PlatformAdminSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use serde_json::json;

    fn named(name: &str) -> Component {
        Component {
            name: name.to_string(),
            ..Component::default()
        }
    }

    fn config_map(name: &str, value: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([("key".to_string(), value.to_string())])),
            ..ConfigMap::default()
        }
    }

    fn catalog() -> ComponentCatalog {
        ComponentCatalog {
            security: BTreeMap::from([(
                "v1".to_string(),
                VersionCatalog {
                    config_maps: vec![config_map("common", "secure")],
                    components: vec![named("vault"), named("core-data")],
                },
            )]),
            no_security: BTreeMap::from([(
                "v1".to_string(),
                VersionCatalog {
                    config_maps: vec![config_map("common", "plain")],
                    components: vec![named("core-data")],
                },
            )]),
        }
    }

    fn platform_admin(security: bool, version: &str, annotations: &[(&str, String)]) -> PlatformAdmin {
        let mut pa = PlatformAdmin::new(
            "edge",
            PlatformAdminSpec {
                version: version.to_string(),
                pool_name: "hangzhou".to_string(),
                security,
            },
        );
        if !annotations.is_empty() {
            pa.metadata.annotations = Some(
                annotations
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), v.clone()))
                    .collect(),
            );
        }
        pa
    }

    fn deployment_template(name: &str) -> serde_json::Value {
        json!({
            "metadata": {"name": name},
            "spec": {
                "selector": {"matchLabels": {"app": name}},
                "template": {"spec": {"containers": [{"name": name, "image": "nginx"}]}}
            }
        })
    }

    fn service_template(name: &str, port: i32) -> serde_json::Value {
        json!({"metadata": {"name": name}, "spec": {"ports": [{"port": port}]}})
    }

    #[test]
    fn test_catalog_selection_by_security_and_version() {
        let desired = resolve(&catalog(), &platform_admin(true, "v1", &[])).unwrap();
        let names: Vec<_> = desired.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["vault", "core-data"]);
        assert_eq!(desired.config_maps, vec![config_map("common", "secure")]);
    }

    #[test]
    fn test_unknown_version_resolves_to_nothing() {
        let desired = resolve(&catalog(), &platform_admin(false, "v9", &[])).unwrap();
        assert_eq!(desired, DesiredState::default());
    }

    #[test]
    fn test_deployment_and_service_with_same_name_merge() {
        let pa = platform_admin(
            false,
            "v9",
            &[
                (
                    ANNOTATION_ADDITIONAL_DEPLOYMENTS,
                    json!([deployment_template("extra-svc")]).to_string(),
                ),
                (
                    ANNOTATION_ADDITIONAL_SERVICES,
                    json!([service_template("extra-svc", 8080)]).to_string(),
                ),
            ],
        );
        let desired = resolve(&catalog(), &pa).unwrap();
        assert_eq!(desired.components.len(), 1);
        let component = &desired.components[0];
        assert_eq!(component.name, "extra-svc");
        assert!(component.deployment.is_some());
        assert_eq!(
            component.service.as_ref().and_then(|s| s.ports.as_ref()).map(Vec::len),
            Some(1)
        );
    }

    #[test]
    fn test_annotation_components_follow_catalog_components() {
        let pa = platform_admin(
            false,
            "v1",
            &[
                (
                    ANNOTATION_ADDITIONAL_DEPLOYMENTS,
                    json!([deployment_template("app-a"), deployment_template("app-b")]).to_string(),
                ),
                (
                    ANNOTATION_ADDITIONAL_SERVICES,
                    json!([service_template("only-svc", 80), service_template("app-b", 81)])
                        .to_string(),
                ),
            ],
        );
        let desired = resolve(&catalog(), &pa).unwrap();
        let names: Vec<_> = desired.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["core-data", "app-a", "app-b", "only-svc"]);
        assert!(desired.components[1].service.is_none());
        assert!(desired.components[2].service.is_some());
        assert!(desired.components[3].deployment.is_none());
        assert_eq!(
            desired.service_names(),
            HashSet::from(["app-b".to_string(), "only-svc".to_string()])
        );
        assert_eq!(
            desired.workload_names(),
            HashSet::from(["app-a".to_string(), "app-b".to_string()])
        );
    }

    #[test]
    fn test_malformed_annotation_is_error() {
        let pa = platform_admin(
            false,
            "v1",
            &[(ANNOTATION_ADDITIONAL_DEPLOYMENTS, "[{not json".to_string())],
        );
        let err = resolve(&catalog(), &pa).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Decode {
                annotation: ANNOTATION_ADDITIONAL_DEPLOYMENTS,
                ..
            }
        ));
    }

    #[test]
    fn test_blank_annotation_is_ignored() {
        let pa = platform_admin(
            false,
            "v1",
            &[(ANNOTATION_ADDITIONAL_SERVICES, "  ".to_string())],
        );
        assert_eq!(resolve(&catalog(), &pa).unwrap().components.len(), 1);
    }

    #[test]
    fn test_template_without_name_is_error() {
        let pa = platform_admin(
            false,
            "v1",
            &[(
                ANNOTATION_ADDITIONAL_SERVICES,
                json!([{"spec": {"ports": [{"port": 80}]}}]).to_string(),
            )],
        );
        assert!(matches!(
            resolve(&catalog(), &pa).unwrap_err(),
            ResolveError::MissingName { .. }
        ));
    }

    #[test]
    fn test_collision_with_catalog_is_error() {
        let pa = platform_admin(
            false,
            "v1",
            &[(
                ANNOTATION_ADDITIONAL_DEPLOYMENTS,
                json!([deployment_template("core-data")]).to_string(),
            )],
        );
        match resolve(&catalog(), &pa).unwrap_err() {
            ResolveError::DuplicateComponent { name } => assert_eq!(name, "core-data"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_annotation_deployments_are_error() {
        let pa = platform_admin(
            false,
            "v9",
            &[(
                ANNOTATION_ADDITIONAL_DEPLOYMENTS,
                json!([deployment_template("x"), deployment_template("x")]).to_string(),
            )],
        );
        assert!(matches!(
            resolve(&catalog(), &pa).unwrap_err(),
            ResolveError::DuplicateComponent { .. }
        ));
    }

    #[test]
    fn test_duplicate_annotation_services_keep_last() {
        let annotations = BTreeMap::from([(
            ANNOTATION_ADDITIONAL_SERVICES.to_string(),
            json!([
                {"metadata": {"name": "extra"}, "spec": {"ports": [{"port": 80}]}},
                {"metadata": {"name": "other"}, "spec": {"ports": [{"port": 81}]}},
                {"metadata": {"name": "extra"}, "spec": {"ports": [{"port": 8080}]}}
            ])
            .to_string(),
        )]);
        let components = annotation_components(Some(&annotations)).unwrap();
        let names: Vec<&str> = components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["extra", "other"]);
        let port = components[0].service.as_ref().unwrap().ports.as_ref().unwrap()[0].port;
        assert_eq!(port, 8080);
    }

    #[test]
    fn test_component_config_maps_are_merged() {
        let mut catalog = catalog();
        let entry = catalog.no_security.get_mut("v1").unwrap();
        entry.components[0].config_maps = vec![
            config_map("core-data-config", "x"),
            config_map("common", "plain"),
        ];
        let desired = resolve(&catalog, &platform_admin(false, "v1", &[])).unwrap();
        assert_eq!(
            desired.config_map_names(),
            HashSet::from(["common".to_string(), "core-data-config".to_string()])
        );
        assert_eq!(desired.config_maps.len(), 2);

        entry_conflict(&mut catalog);
        assert!(matches!(
            resolve(&catalog, &platform_admin(false, "v1", &[])).unwrap_err(),
            ResolveError::DuplicateConfigMap { .. }
        ));
    }

    fn entry_conflict(catalog: &mut ComponentCatalog) {
        let entry = catalog.no_security.get_mut("v1").unwrap();
        entry.components[0].config_maps = vec![config_map("common", "different")];
    }
}
