//! # CRD Generator
//!
//! Prints the CustomResourceDefinitions of `PlatformAdmin` and `YurtAppSet`
//! as a multi-document YAML stream.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/crds.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use anyhow::{Context, Result};
use kube::CustomResourceExt;
use platform_admin_controller::crd::{PlatformAdmin, YurtAppSet};

fn main() -> Result<()> {
    let documents = [
        serde_yaml::to_string(&PlatformAdmin::crd()).context("Failed to render PlatformAdmin CRD")?,
        serde_yaml::to_string(&YurtAppSet::crd()).context("Failed to render YurtAppSet CRD")?,
    ];
    print!("{}", documents.join("---\n"));
    Ok(())
}
