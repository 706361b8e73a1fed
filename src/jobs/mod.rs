pub mod executor;
pub mod queue;

pub use executor::{update_progress, JobExecutor};
pub use queue::{JobMessage, JobQueue};
