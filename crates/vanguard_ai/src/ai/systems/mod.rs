//! AI systems (perception → FSM → positioning)

pub mod fsm;
pub mod perception;
pub mod positioning;

// Re-export all systems
pub use fsm::*;
pub use perception::*;
pub use positioning::*;
