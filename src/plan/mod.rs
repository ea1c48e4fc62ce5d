pub mod day_plan;
pub mod error;
pub mod events;
pub mod record_store;
pub mod risk;
pub mod scheduler;
pub mod session;
pub mod subject;
pub mod summary;
pub mod timer;

pub use error::{PlanError, Precondition};
pub use scheduler::Planner;
