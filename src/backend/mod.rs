//! Backend module - Traits, the worker HTTP client and the active backend slot

pub mod http_backend;
pub mod registry;
pub mod traits;

pub use registry::BackendRegistry;
pub use traits::{BackendProvider, InpaintBackend, InpaintParams, ModelInfo, ModelType};
