pub mod types;
pub mod classification;

pub use types::XsltProbeError;
pub use classification::ErrorClassification;
