//! Module registry, lifecycle/binding engine, and the `Module` trait hosted
//! modules implement.

mod context;
mod descriptor;
mod registry;

pub use context::EntityState;
pub use descriptor::{ApiHandle, ElementDescriptor, ElementsSource, Module, ModuleCategory, ModuleConfig};
pub use registry::{ModuleRegistry, Stage};
