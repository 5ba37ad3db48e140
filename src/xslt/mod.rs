pub mod executor;

pub use executor::{ProcessXsltExecutor, XsltExecutor, DEFAULT_COMMAND};
