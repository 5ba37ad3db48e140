pub mod director;
pub mod events;
pub mod manager;
pub mod phase;
pub mod state;

pub use director::ProcessDirector;
pub use events::ProcessEvent;
pub use manager::ProcessDirectorManager;
pub use state::{DirectorSettings, DirectorStats, ProcessState, ProcessingMode};

#[cfg(test)]
pub(crate) mod testing;
