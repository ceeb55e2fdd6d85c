//! Client-side session state: conversation history, HITL coordination,
//! reconnection policy, and the event pipeline feeding them.

pub mod conversation;
pub mod hitl;
pub mod pipeline;
pub mod reconnect;
