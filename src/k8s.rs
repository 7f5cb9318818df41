pub use error::K8sError as Error;
pub mod client;
pub mod error;
pub mod labels;
pub mod mapping;
pub mod selector;
pub mod watch;
