// src/core/mod.rs

//! Configuration references, their factory, the command lifecycle and confkit settings.

pub mod dir_ref;
pub mod factory;
pub mod file_ref;
pub mod lifecycle;
pub mod paths;
pub mod settings;
pub mod stream;

pub use dir_ref::ConfigDirReference;
pub use factory::{ArgumentError, ConfRef, RefAction, ReferenceFactory};
pub use file_ref::{ConfigFileReference, RefError};
pub use lifecycle::{CommandIo, ConfCommand, LifecycleError};
pub use stream::{AccessMode, SharedBuffer, StreamEndpoint};
