//! Domain model module declarations.

pub mod execution;
pub mod hitl;
pub mod plan;
pub mod session;
pub mod turn;
