//! # Ferry Core
//!
//! Core types for the ferry replication control plane.
//!
//! This crate holds everything the pipeline needs that does no I/O:
//!
//! - [`model`] - resources, artifacts and registry records
//! - [`filter`] - policy filters and the filter pipeline
//! - [`rewrite`] - source to destination repository mapping
//! - [`policy`] - the replication policy, its validation and the reader shim
//!   for legacy rows
//! - [`cron`] - minute-resolution cron expressions for scheduled triggers
//!
//! ## Example
//!
//! ```rust
//! use ferry_core::filter::{apply_filters, Filter};
//! use ferry_core::model::{Artifact, Resource, ResourceType};
//!
//! let resources = vec![Resource::new(ResourceType::Image, "library/hello-world")
//!     .with_artifact(Artifact::new("sha256:1").with_tags(["latest", "v1"]))];
//!
//! let selected = apply_filters(resources, &[Filter::tag("v*")]).unwrap();
//! assert_eq!(selected[0].summary(), "library/hello-world [1 item(s) in total]");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cron;
pub mod error;
pub mod filter;
pub mod model;
pub mod policy;
pub mod rewrite;
pub mod validation;


// Re-export main types at crate root
pub use crate::cron::CronExpr;
pub use error::{Error, ErrorKind, Result};
pub use filter::{apply_filters, Decoration, Filter, FilterType};
pub use model::{Artifact, Registry, RegistryType, Resource, ResourceType};
pub use policy::{Policy, Trigger, TriggerType};
pub use rewrite::replace_namespace;
pub use validation::{Validate, ValidationError, ValidationErrors};
