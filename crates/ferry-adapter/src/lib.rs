//! # Ferry Adapter
//!
//! The contract between the replication flow and registry endpoints.
//!
//! ## Features
//!
//! - **Capability model**: a base [`Adapter`] plus optional
//!   [`ArtifactRegistry`] and [`ChartRegistry`] capabilities
//! - **Factory table**: registry type to [`AdapterFactory`], frozen after
//!   startup
//! - **Native adapter**: Docker Registry HTTP API v2 with catalog
//!   pagination and bounded concurrent tag listing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferry_adapter::{FactoryRegistry, NativeAdapterConfig, NativeFactory};
//! use ferry_core::model::{Registry, RegistryType};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = FactoryRegistry::builder();
//! builder.register(
//!     RegistryType::DOCKER_REGISTRY,
//!     NativeFactory::new(NativeAdapterConfig::default()),
//! )?;
//! let factories = builder.build();
//!
//! let registry = Registry::new(
//!     1,
//!     "mirror",
//!     RegistryType::DOCKER_REGISTRY,
//!     "https://mirror.local",
//! );
//! let adapter = factories.create(&registry)?;
//! let health = adapter.health_check().await?;
//! println!("{health:?}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod config;
mod error;
mod factory;
mod info;
mod native;
mod runner;

pub use adapter::{
    artifact_registry, chart_registry, fetch_resources, Adapter, ArtifactRegistry, ChartRegistry,
    ChartStream,
};
pub use config::NativeAdapterConfig;
pub use error::{AdapterError, Result};
pub use factory::{AdapterFactory, FactoryRegistry, FactoryRegistryBuilder};
pub use info::{Descriptor, FilterStyle, FilterSupport, HealthStatus, RegistryInfo};
pub use native::{NativeAdapter, NativeFactory};
pub use runner::run_bounded;
