//! # CRD Validation Tests
//!
//! Sample manifests must deserialize into the Rust types, and the generated
//! CRDs must keep the group, versions and subresources other OpenYurt
//! components rely on.

use kube::CustomResourceExt;
use platform_admin_controller::crd::{ConditionStatus, PlatformAdmin, YurtAppSet};

#[test]
fn test_platform_admin_manifest() {
    let yaml = r#"
apiVersion: iot.openyurt.io/v1alpha2
kind: PlatformAdmin
metadata:
  name: hangzhou-platform
  namespace: edge
  annotations:
    AdditionalServices: '[{"metadata":{"name":"extra"},"spec":{"ports":[{"port":80}]}}]'
spec:
  version: minnesota
  poolName: hangzhou
  security: true
status:
  initialized: true
  ready: false
  readyComponentNum: 3
  unreadyComponentNum: 1
  conditions:
    - type: ComponentAvailable
      status: "False"
      reason: ComponentProvisioning
      lastTransitionTime: "2024-05-01T10:00:00Z"
"#;
    let pa: PlatformAdmin = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(pa.spec.version, "minnesota");
    assert_eq!(pa.spec.pool_name, "hangzhou");
    assert!(pa.spec.security);

    let status = pa.status.unwrap();
    assert_eq!(status.ready_component_num, 3);
    assert_eq!(status.conditions[0].status, ConditionStatus::False);
    assert_eq!(status.conditions[0].message, None);
}

#[test]
fn test_platform_admin_defaults() {
    let yaml = r#"
apiVersion: iot.openyurt.io/v1alpha2
kind: PlatformAdmin
metadata:
  name: minimal
spec:
  poolName: beijing
"#;
    let pa: PlatformAdmin = serde_yaml::from_str(yaml).unwrap();
    assert!(!pa.spec.security);
    assert!(pa.spec.version.is_empty());
    assert!(pa.status.is_none());
}

#[test]
fn test_yurt_app_set_manifest() {
    let yaml = r#"
apiVersion: apps.openyurt.io/v1alpha1
kind: YurtAppSet
metadata:
  name: core-data
  namespace: edge
spec:
  selector:
    matchLabels:
      app: core-data
  workloadTemplate:
    deploymentTemplate:
      metadata:
        labels:
          app: core-data
      spec:
        selector:
          matchLabels:
            app: core-data
        template:
          metadata:
            labels:
              app: core-data
          spec:
            containers:
              - name: core-data
                image: edgexfoundry/core-data:3.0.0
  topology:
    pools:
      - name: hangzhou
        nodeSelectorTerm:
          matchExpressions:
            - key: apps.openyurt.io/nodepool
              operator: In
              values: [hangzhou]
        replicas: 1
        patch:
          spec:
            replicas: 2
status:
  replicas: 1
  readyReplicas: 1
  poolReplicas:
    hangzhou: 1
"#;
    let yas: YurtAppSet = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(yas.pool_index("hangzhou"), Some(0));
    assert!(yas.is_pool_ready("hangzhou"));
    assert!(!yas.is_pool_ready("beijing"));
    assert!(yas.spec.topology.pools[0].patch.is_some());
}

#[test]
fn test_generated_crds() {
    let pa = PlatformAdmin::crd();
    assert_eq!(pa.spec.group, "iot.openyurt.io");
    assert_eq!(pa.spec.names.kind, "PlatformAdmin");
    assert_eq!(pa.spec.names.short_names, Some(vec!["pa".to_string()]));
    let version = &pa.spec.versions[0];
    assert_eq!(version.name, "v1alpha2");
    assert!(version.subresources.as_ref().and_then(|s| s.status.as_ref()).is_some());
    let columns: Vec<&str> = version
        .additional_printer_columns
        .iter()
        .flatten()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(columns, vec!["Ready", "ReadyComponentNum", "UnreadyComponentNum"]);

    let yas = YurtAppSet::crd();
    assert_eq!(yas.spec.group, "apps.openyurt.io");
    assert_eq!(yas.spec.versions[0].name, "v1alpha1");
    let rendered = serde_yaml::to_string(&yas).unwrap();
    assert!(rendered.contains("x-kubernetes-preserve-unknown-fields"));
}
