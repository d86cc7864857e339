//! Marketplace catalog of published plugin packages.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use semver::Version;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use agentbase_core::error::AppError;
use agentbase_core::result::AppResult;

use crate::manifest::{PluginManifest, PluginPackage};

/// Marketplace status of a plugin, shared by all of its versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    /// Listed and installable.
    #[default]
    Published,
    /// Listed for existing installations; new installs are refused.
    Deprecated,
}

impl PackageStatus {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Deprecated => "deprecated",
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "published" => Ok(Self::Published),
            "deprecated" => Ok(Self::Deprecated),
            other => Err(AppError::validation(format!(
                "Unknown marketplace status '{other}'"
            ))),
        }
    }
}

/// One marketplace row: the latest manifest of a plugin and its status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogListing {
    /// Manifest of the highest published version.
    #[serde(flatten)]
    pub manifest: PluginManifest,
    /// Marketplace status.
    pub status: PackageStatus,
}

#[derive(Debug, Default)]
struct CatalogEntry {
    status: PackageStatus,
    versions: BTreeMap<Version, Arc<PluginPackage>>,
}

/// Published packages, keyed by name and then version.
///
/// A `(name, version)` pair is immutable once published.
#[derive(Debug, Default)]
pub struct PluginCatalog {
    packages: RwLock<BTreeMap<String, CatalogEntry>>,
}

impl PluginCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and publishes a package.
    ///
    /// Publishing a new version marks the plugin `published` again.
    /// Fails with `Conflict` if the same name and version is already published.
    pub async fn publish(&self, package: PluginPackage) -> AppResult<Arc<PluginPackage>> {
        package.validate()?;
        let version = package.manifest.parsed_version()?;

        let mut packages = self.packages.write().await;
        let entry = packages.entry(package.manifest.name.clone()).or_default();
        if entry.versions.contains_key(&version) {
            return Err(AppError::conflict(format!(
                "Plugin '{}' version {} is already published",
                package.manifest.name, version
            )));
        }

        let package = Arc::new(package);
        entry.versions.insert(version, package.clone());
        entry.status = PackageStatus::Published;

        info!(
            plugin_id = %package.manifest.name,
            version = %package.manifest.version,
            "Plugin published"
        );
        Ok(package)
    }

    /// Publishes the package unless that name and version already exists,
    /// in which case the existing package is returned. The status is left
    /// as it is.
    pub async fn publish_or_get(&self, package: Arc<PluginPackage>) -> AppResult<Arc<PluginPackage>> {
        package.validate()?;
        let version = package.manifest.parsed_version()?;

        let mut packages = self.packages.write().await;
        let entry = packages.entry(package.manifest.name.clone()).or_default();
        Ok(entry.versions.entry(version).or_insert(package).clone())
    }

    /// Marks every version of `name` deprecated.
    pub async fn deprecate(&self, name: &str) -> AppResult<CatalogListing> {
        let mut packages = self.packages.write().await;
        let entry = packages
            .get_mut(name)
            .ok_or_else(|| AppError::not_found(format!("Plugin '{name}' is not published")))?;
        entry.status = PackageStatus::Deprecated;

        info!(plugin_id = %name, "Plugin deprecated");
        listing(entry).ok_or_else(|| AppError::not_found(format!("Plugin '{name}' is not published")))
    }

    /// Returns the marketplace status of `name`.
    pub async fn status(&self, name: &str) -> Option<PackageStatus> {
        self.packages.read().await.get(name).map(|entry| entry.status)
    }

    /// Returns a specific published version.
    pub async fn get(&self, name: &str, version: &str) -> Option<Arc<PluginPackage>> {
        let version = Version::parse(version).ok()?;
        let packages = self.packages.read().await;
        packages.get(name)?.versions.get(&version).cloned()
    }

    /// Returns the highest published version of `name`.
    pub async fn latest(&self, name: &str) -> Option<Arc<PluginPackage>> {
        let packages = self.packages.read().await;
        packages
            .get(name)?
            .versions
            .last_key_value()
            .map(|(_, package)| package.clone())
    }

    /// Returns the requested version, or the latest when `version` is `None`.
    pub async fn resolve(&self, name: &str, version: Option<&str>) -> AppResult<Arc<PluginPackage>> {
        let found = match version {
            Some(version) => self.get(name, version).await,
            None => self.latest(name).await,
        };
        found.ok_or_else(|| match version {
            Some(version) => AppError::not_found(format!(
                "Plugin '{name}' version {version} is not published"
            )),
            None => AppError::not_found(format!("Plugin '{name}' is not published")),
        })
    }

    /// Lists the latest manifest of every plugin, ordered by name,
    /// optionally restricted to one status.
    pub async fn list_marketplace(&self, status: Option<PackageStatus>) -> Vec<CatalogListing> {
        let packages = self.packages.read().await;
        packages
            .values()
            .filter(|entry| status.is_none_or(|wanted| entry.status == wanted))
            .filter_map(listing)
            .collect()
    }
}

fn listing(entry: &CatalogEntry) -> Option<CatalogListing> {
    entry
        .versions
        .last_key_value()
        .map(|(_, package)| CatalogListing {
            manifest: package.manifest.clone(),
            status: entry.status,
        })
}
