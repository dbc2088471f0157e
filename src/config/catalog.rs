//! # Component Catalog
//!
//! Version-keyed static catalog of platform components, loaded from YAML at
//! startup.
//!
//! ```yaml
//! noSecurity:
//!   minnesota:
//!     configMaps:
//!       - metadata: { name: common-variables }
//!         data: { EDGEX_SECURITY_SECRET_STORE: "false" }
//!     components:
//!       - name: edgex-core-data
//!         service: { ports: [{ port: 59880 }] }
//!         deployment: { template: { spec: { containers: [...] } } }
//! security:
//!   minnesota: { ... }
//! ```

use k8s_openapi::api::apps::v1::DeploymentSpec;
use k8s_openapi::api::core::v1::{ConfigMap, ServiceSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// One deployable unit of a platform.
///
/// A component may carry an exposure (`service`), a workload (`deployment`)
/// or both. Components are recomputed on every pass and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    /// Config objects this component needs in addition to the version-level ones
    #[serde(default)]
    pub config_maps: Vec<ConfigMap>,
    #[serde(default)]
    pub service: Option<ServiceSpec>,
    #[serde(default)]
    pub deployment: Option<DeploymentSpec>,
}

/// Everything the catalog holds for one `(security, version)` pair
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCatalog {
    #[serde(default)]
    pub config_maps: Vec<ConfigMap>,
    #[serde(default)]
    pub components: Vec<Component>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read component catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse component catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Static component catalog keyed by security mode and platform version
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentCatalog {
    #[serde(default)]
    pub security: BTreeMap<String, VersionCatalog>,
    #[serde(default)]
    pub no_security: BTreeMap<String, VersionCatalog>,
}

impl ComponentCatalog {
    /// Load the catalog from a YAML file.
    ///
    /// A missing file yields an empty catalog; every PlatformAdmin then
    /// resolves to its annotation components only.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    path = %path.display(),
                    "Component catalog not found, starting with an empty catalog"
                );
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(CatalogError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let catalog = Self::from_yaml(&raw).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            path = %path.display(),
            security_versions = catalog.security.len(),
            no_security_versions = catalog.no_security.len(),
            "Loaded component catalog"
        );
        Ok(catalog)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Catalog entry for the given mode and version; `None` for unknown versions
    #[must_use]
    pub fn version(&self, security: bool, version: &str) -> Option<&VersionCatalog> {
        if security {
            self.security.get(version)
        } else {
            self.no_security.get(version)
        }
    }

    /// Components for the given mode and version, empty when unknown
    #[must_use]
    pub fn components(&self, security: bool, version: &str) -> &[Component] {
        self.version(security, version)
            .map_or(&[], |v| v.components.as_slice())
    }

    /// Version-level config objects for the given mode and version
    #[must_use]
    pub fn config_maps(&self, security: bool, version: &str) -> &[ConfigMap] {
        self.version(security, version)
            .map_or(&[], |v| v.config_maps.as_slice())
    }
}
