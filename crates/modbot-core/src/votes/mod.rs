//! Reaction-governed polls: model, lifecycle and result tallying.

pub mod lifecycle;
pub mod model;
pub mod tally;

pub use lifecycle::VoteLifecycle;
pub use model::{NewVote, NewVotePoint, Vote, VoteOption, VotePoint, VoteState};
pub use tally::{OptionCount, Tally, TallyResult};
