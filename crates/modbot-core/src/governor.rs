//! Reaction validation on active votes.
//!
//! Checks run in order and the first failing one removes the new reaction:
//! option validity, role filter, then (exceptional votes only) exclusivity.
//! Only newly arriving reactions are checked; earlier reactions are never
//! re-validated when a vote's options or role filter change.

use tracing::{debug, warn};

use crate::{
    context::BotContext,
    domain::RoleId,
    errors::Error,
    platform::ReactionEvent,
    votes::{Vote, VoteState},
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovalReason {
    /// Not one of the vote's options.
    InvalidEmoji,
    /// Reactor holds none of the filtered roles.
    RoleFilter,
    /// Exceptional vote and the reactor already picked another option.
    AlreadyVoted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GovernorVerdict {
    Accepted,
    Removed(RemovalReason),
    /// Valid so far, but the exclusivity check could not fetch reactors and was skipped.
    ExclusivitySkipped,
}

#[derive(Clone)]
pub struct ReactionGovernor {
    ctx: BotContext,
}

impl ReactionGovernor {
    pub fn new(ctx: BotContext) -> Self {
        Self { ctx }
    }

    /// Govern a new reaction on `vote`.
    ///
    /// `reactor_roles` is looked up from the platform when `None`, and only if
    /// the vote has a role filter. A failed lookup fails the event after the
    /// validity check has already run.
    pub async fn on_reaction_add(
        &self,
        vote: &Vote,
        reaction: &ReactionEvent,
        reactor_roles: Option<&[RoleId]>,
    ) -> Result<GovernorVerdict> {
        if vote.state != VoteState::Active {
            return Err(Error::Misconfigured(format!(
                "vote {} is {}, reactions are only governed on active votes",
                vote.id, vote.state
            )));
        }

        let default_emoji = &self.ctx.cfg.default_vote_emoji;
        if !vote.is_valid_emoji(&reaction.emoji, default_emoji) {
            return self.remove(vote, reaction, RemovalReason::InvalidEmoji).await;
        }

        if !vote.role_filter.is_empty() {
            let fetched;
            let roles = match reactor_roles {
                Some(roles) => roles,
                None => {
                    fetched = self
                        .ctx
                        .platform
                        .member_roles(reaction.server_id, reaction.user_id)
                        .await?;
                    &fetched[..]
                }
            };
            if !vote.admits_roles(roles) {
                return self.remove(vote, reaction, RemovalReason::RoleFilter).await;
            }
        }

        if vote.is_exceptional {
            let msg = reaction.message();
            let others = vote
                .options(default_emoji, &self.ctx.cfg.default_vote_label)
                .into_iter()
                .filter(|o| o.emoji != reaction.emoji);

            for option in others {
                match self.ctx.platform.list_reactors(msg, &option.emoji).await {
                    Ok(users) if users.contains(&reaction.user_id) => {
                        return self.remove(vote, reaction, RemovalReason::AlreadyVoted).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(
                            vote = %vote.id,
                            user = %reaction.user_id,
                            error = %e,
                            "reactor fetch failed; skipping exclusivity check"
                        );
                        return Ok(GovernorVerdict::ExclusivitySkipped);
                    }
                }
            }
        }

        debug!(vote = %vote.id, user = %reaction.user_id, emoji = %reaction.emoji, "vote reaction accepted");
        Ok(GovernorVerdict::Accepted)
    }

    async fn remove(
        &self,
        vote: &Vote,
        reaction: &ReactionEvent,
        reason: RemovalReason,
    ) -> Result<GovernorVerdict> {
        debug!(
            vote = %vote.id,
            user = %reaction.user_id,
            emoji = %reaction.emoji,
            ?reason,
            "removing vote reaction"
        );
        self.ctx
            .platform
            .remove_reaction(reaction.message(), reaction.user_id, &reaction.emoji)
            .await?;
        Ok(GovernorVerdict::Removed(reason))
    }
}
