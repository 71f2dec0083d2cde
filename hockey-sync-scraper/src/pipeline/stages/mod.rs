//! Stage workers. Each stage reads and writes exclusively
//! through the [`crate::store::Store`]; the orchestrator sequences them.

pub mod competitions;
pub mod games;
pub mod ladder;
pub mod players;
pub mod results;
pub mod teams;
