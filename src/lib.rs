//! Adaptive XSS discovery for XSLT stylesheets.
//!
//! Stylesheets are exercised with generated XML documents. Values that reach
//! the HTML output unescaped are re-sent with injection payloads and reported
//! once the payload is confirmed in the transformed output.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod errors;
pub mod generator;
pub mod models;
pub mod pipeline;
pub mod pool;
pub mod reporting;
pub mod schema;
pub mod tasks;
pub mod xslt;
