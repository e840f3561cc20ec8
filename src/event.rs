//! Event Store
//!
//! Tracks the lifecycle of the one event an agent's graph is processing,
//! including graph steps that suspended on asynchronous work.

mod contract;
mod payload;
mod query;
mod status;
mod store;

pub use contract::{EventHistory, GraphInterpreter, StateService};
pub use payload::Event;
pub use query::{EventProperty, GraphEventQuery};
pub use status::{FinishPolicy, Status};
pub use store::{EventGeneration, EventStore};
