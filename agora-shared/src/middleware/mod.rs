mod auth_extractor;
mod cors_layer;
mod metrics_layer;
mod tracing_layer;

pub use cors_layer::*;
pub use metrics_layer::*;
pub use tracing_layer::*;
