//! AI components

pub mod fsm;
pub mod perception;
pub mod positioning;
pub mod role;

// Tests (separate files with _tests suffix)
#[cfg(test)]
mod fsm_tests;
#[cfg(test)]
mod positioning_tests;

// Re-export all components
pub use fsm::*;
pub use perception::*;
pub use positioning::*;
pub use role::*;
