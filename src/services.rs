//! In-process collaborator services
//!
//! Memory-backed state and history services. Agents use them when no
//! database-backed service is wired in, and tests use their call accounting.

mod history;
mod state;

pub use history::MemoryEventHistory;
pub use state::MemoryStateService;
