//! ESignage Web API
//!
//! Device provisioning, configuration distribution, and firmware image
//! assembly behind an axum HTTP surface.

pub mod config;
pub mod configuration;
pub mod image;
pub mod provision;
pub mod routes;
pub mod server;

pub use config::{ImageToolConfig, ServerConfig};
pub use configuration::ConfigurationService;
pub use image::ImageBuilder;
pub use provision::ProvisioningService;
