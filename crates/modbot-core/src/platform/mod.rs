//! Chat-platform abstractions (the transport lives in an adapter crate).

pub mod port;
pub mod timed;
pub mod types;

pub use port::ChatPlatform;
pub use timed::TimedPlatform;
pub use types::ReactionEvent;
