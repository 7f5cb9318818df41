//! # Kubernetes collection selector
//!
//! Walks every object of a kind that matches a label selector, one server page at a time, and
//! opens watches on the same selection. Higher level resource visitors build on top of this
//! library.

pub mod config;
pub mod k8s;
pub mod logging;

pub use crate::k8s::client::{CollectionClient, ListOptions, SyncCollectionClient};
pub use crate::k8s::mapping::ResourceMapping;
pub use crate::k8s::selector::{Info, Selector};
