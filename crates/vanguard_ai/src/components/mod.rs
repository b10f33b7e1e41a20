//! ECS Components общие для AI и combat
//!
//! Организация по доменам:
//! - actor: фракция + health (damage capability)
//! - movement: контракт навигации + headless NavAgent

pub mod actor;
pub mod movement;

// Re-exports для удобного импорта
pub use actor::*;
pub use movement::*;
