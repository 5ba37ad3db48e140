pub mod evolution;
pub mod model;
pub mod provider;

pub use evolution::{ConstraintRelaxingEvolver, SchemaEvolver};
pub use model::*;
pub use provider::{SchemaProvider, SchemaRepository};
