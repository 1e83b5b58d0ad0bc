//! Model persistence.

mod snapshot;

pub use snapshot::{PersistedModel, MODEL_FORMAT_VERSION};
