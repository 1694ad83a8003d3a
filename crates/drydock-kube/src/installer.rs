//! kURL installer custom resource and context building
//!
//! Embedded clusters carry a `cluster.kurl.sh/v1beta1 Installer` describing
//! which add-ons were installed. Preflight documents read its settings through
//! the `Kurl*` template functions, keyed `"<Category>.<Field>"`
//! (`"Kubernetes.Version"`, `"Rook.CephReplicaCount"`, ...).

use async_trait::async_trait;
use drydock_core::installer_category;
use drydock_core::{InstallerCategory, InstallerContext, InstallerSchema};
use kube::{Api, CustomResource};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KubeError, Result};

installer_category! {
    pub struct Kubernetes {
        pub version: String => "Version",
        #[serde(rename = "serviceCIDR")]
        pub service_cidr: String => "ServiceCIDR",
        pub service_cidr_range: String => "ServiceCidrRange",
        #[serde(rename = "HACluster")]
        pub ha_cluster: bool => "HACluster",
        pub master_address: String => "MasterAddress",
        pub load_balancer_address: String => "LoadBalancerAddress",
        pub bootstrap_token: String => "BootstrapToken",
        #[serde(rename = "bootstrapTokenTTL")]
        pub bootstrap_token_ttl: String => "BootstrapTokenTTL",
        #[serde(rename = "kubeadmTokenCAHash")]
        pub kubeadm_token_ca_hash: String => "KubeadmTokenCAHash",
        pub control_plane: bool => "ControlPlane",
        pub cert_key: String => "CertKey",
    }
}

installer_category! {
    pub struct Docker {
        pub version: String => "Version",
        pub bypass_storagedriver_warnings: bool => "BypassStorageDriverWarnings",
        pub hard_fail_on_loopback: bool => "HardFailOnLoopback",
        #[serde(rename = "noCEOnEE")]
        pub no_ce_on_ee: bool => "NoCEOnEE",
        #[serde(rename = "dockerRegistryIP")]
        pub docker_registry_ip: String => "DockerRegistryIP",
        pub additional_no_proxy: String => "AdditionalNoProxy",
    }
}

installer_category! {
    pub struct Weave {
        pub version: String => "Version",
        #[serde(rename = "podCIDR")]
        pub pod_cidr: String => "PodCIDR",
        pub pod_cidr_range: String => "PodCidrRange",
        pub is_encryption_disabled: bool => "IsEncryptionDisabled",
    }
}

installer_category! {
    pub struct Contour {
        pub version: String => "Version",
    }
}

installer_category! {
    pub struct Rook {
        pub version: String => "Version",
        pub storage_class_name: String => "StorageClassName",
        pub ceph_replica_count: i64 => "CephReplicaCount",
        pub is_block_storage_enabled: bool => "IsBlockStorageEnabled",
        pub block_device_filter: String => "BlockDeviceFilter",
    }
}

installer_category! {
    pub struct Registry {
        pub version: String => "Version",
        pub publish_port: i64 => "PublishPort",
    }
}

installer_category! {
    pub struct Prometheus {
        pub version: String => "Version",
    }
}

installer_category! {
    pub struct Fluentd {
        pub version: String => "Version",
        #[serde(rename = "fullEFKStack")]
        pub full_efk_stack: bool => "FullEFKStack",
    }
}

installer_category! {
    pub struct Kotsadm {
        pub version: String => "Version",
        pub application_slug: String => "ApplicationSlug",
        pub ui_bind_port: i64 => "UiBindPort",
        pub hostname: String => "Hostname",
        pub application_namespace: String => "ApplicationNamespace",
    }
}

installer_category! {
    pub struct Velero {
        pub version: String => "Version",
        pub namespace: String => "Namespace",
        #[serde(rename = "disableCLI")]
        pub disable_cli: bool => "DisableCLI",
        pub disable_restic: bool => "DisableRestic",
        pub local_bucket: String => "LocalBucket",
    }
}

installer_category! {
    pub struct Ekco {
        pub version: String => "Version",
        pub node_unreachable_toleration_duration: String => "NodeUnreachableTolerationDuration",
        pub min_ready_master_node_count: i64 => "MinReadyMasterNodeCount",
        pub min_ready_worker_node_count: i64 => "MinReadyWorkerNodeCount",
        pub should_disable_reboot_services: bool => "ShouldDisableRebootServices",
        pub rook_should_use_all_nodes: bool => "RookShouldUseAllNodes",
    }
}

installer_category! {
    pub struct Kurl {
        pub airgap: bool => "Airgap",
        pub proxy_address: String => "ProxyAddress",
        pub additional_no_proxy_addresses: Vec<String>,
        pub no_proxy: bool => "NoProxy",
        pub public_address: String => "PublicAddress",
        pub private_address: String => "PrivateAddress",
        pub host_preflight_ignore: bool => "HostPreflightIgnore",
    }
}

/// Spec of a kURL `Installer`
///
/// A category left out of the resource deserializes to its defaults, so every
/// category contributes its full key set.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "cluster.kurl.sh",
    version = "v1beta1",
    kind = "Installer",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase", default)]
pub struct InstallerSpec {
    pub kubernetes: Kubernetes,
    pub docker: Docker,
    pub weave: Weave,
    pub contour: Contour,
    pub rook: Rook,
    pub registry: Registry,
    pub prometheus: Prometheus,
    pub fluentd: Fluentd,
    pub kotsadm: Kotsadm,
    pub velero: Velero,
    pub ekco: Ekco,
    pub kurl: Kurl,
}

impl InstallerSchema for InstallerSpec {
    fn categories(&self) -> Vec<&dyn InstallerCategory> {
        vec![
            &self.kubernetes as &dyn InstallerCategory,
            &self.docker,
            &self.weave,
            &self.contour,
            &self.rook,
            &self.registry,
            &self.prometheus,
            &self.fluentd,
            &self.kotsadm,
            &self.velero,
            &self.ekco,
            &self.kurl,
        ]
    }
}

/// Where installer specs come from
#[async_trait]
pub trait InstallerSource: Send + Sync {
    async fn fetch(&self, name: &str, namespace: &str) -> Result<InstallerSpec>;
}

/// Reads `Installer` resources from the cluster API
#[derive(Clone)]
pub struct ClusterInstallerSource {
    client: kube::Client,
}

impl ClusterInstallerSource {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// Connect using the ambient kubeconfig or in-cluster config
    pub async fn try_default() -> Result<Self> {
        let client = kube::Client::try_default().await?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl InstallerSource for ClusterInstallerSource {
    async fn fetch(&self, name: &str, namespace: &str) -> Result<InstallerSpec> {
        let api: Api<Installer> = Api::namespaced(self.client.clone(), namespace);
        let installer = api.get(name).await?;
        Ok(installer.spec)
    }
}

/// Builds flattened installer contexts for template rendering
pub struct InstallerContextBuilder<S: InstallerSource> {
    source: S,
}

impl<S: InstallerSource> InstallerContextBuilder<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Fetch installer `name` in `namespace` and flatten it
    pub async fn build(&self, name: &str, namespace: &str) -> Result<InstallerContext> {
        let spec = self
            .source
            .fetch(name, namespace)
            .await
            .map_err(|e| KubeError::InstallerFetch {
                name: name.to_string(),
                namespace: namespace.to_string(),
                source: Box::new(e),
            })?;

        let context = InstallerContext::from_schema(&spec);
        debug!(name, namespace, keys = context.len(), "built installer context");
        Ok(context)
    }
}
