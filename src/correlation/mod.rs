//! Correlation of externally supplied images with their processed results

pub mod cache;
pub mod metadata;
pub mod workflow;

pub use cache::{CorrelationCache, Correlator, ExplicitOrLatest, LatestIngested};
pub use metadata::CorrelationMetadata;
pub use workflow::{Ingested, Notification, UnityWorkflow};
