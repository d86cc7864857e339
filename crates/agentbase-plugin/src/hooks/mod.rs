//! Hook system: extension point names, callbacks, the registry and the dispatcher.

pub mod callback;
pub mod definitions;
pub mod dispatcher;
pub mod registry;
