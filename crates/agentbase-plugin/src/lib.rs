//! # agentbase-plugin
//!
//! Plugin runtime for Agentbase. Provides:
//!
//! - Plugin descriptors (manifest, definition, settings schema) and a catalog
//! - Hook/filter registry keyed by application and extension point
//! - Dispatcher with fire-and-forget actions and fail-open filter pipelines
//! - Lifecycle management (install, activate, deactivate, uninstall)
//! - A route bridge that lets active plugins serve HTTP subpaths
//! - A capability-scoped API handed to every plugin callback
//!
//! Everything hangs off an explicitly constructed [`Runtime`]; there is no
//! process-wide state.

pub mod api;
pub mod bridge;
pub mod catalog;
pub mod error;
pub mod hooks;
pub mod installation;
pub mod manager;
pub mod manifest;
pub mod prelude;
pub mod runtime;
pub mod store;

pub use api::context::{InvocationScope, PluginContext};
pub use bridge::{BridgeRequest, BridgeResponse, RouteBridge, RouteDescriptor};
pub use catalog::{CatalogListing, PackageStatus, PluginCatalog};
pub use error::CallbackError;
pub use hooks::callback::Callback;
pub use hooks::definitions::CallbackKind;
pub use hooks::dispatcher::{DispatchReport, HookDispatcher};
pub use hooks::registry::HookRegistry;
pub use installation::{Installation, InstallationState};
pub use manager::PluginManager;
pub use manifest::{PluginDefinition, PluginManifest, PluginPackage, SettingField, SettingType};
pub use runtime::Runtime;
pub use store::InstallationStore;
