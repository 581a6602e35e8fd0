pub mod core;
pub mod orchestration;
pub mod security;
pub mod store;

pub use crate::core::*;
pub use orchestration::{Pipeline, PublishRequest, RunReport, resolve_package};
pub use security::{Credentials, Redactor};
pub use store::{BackendConfig, HttpSettings, WebStoreClient};
