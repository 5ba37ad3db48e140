pub mod descriptor;
pub mod document;
pub mod finding;
pub mod modifier;
pub mod report;
pub mod stylesheet;

pub use descriptor::*;
pub use document::*;
pub use finding::*;
pub use modifier::*;
pub use report::*;
pub use stylesheet::*;
