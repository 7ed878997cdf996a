use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{
    audit::AuditEvent,
    context::BotContext,
    domain::{MessageId, MessageRef, RoleId, ServerId, VoteId},
    errors::Error,
    votes::{
        model::{NewVote, NewVotePoint, Vote, VoteOption, VoteState},
        tally::{OptionCount, Tally},
    },
    Result,
};

/// Creates, publishes, activates, finalises and deletes votes.
#[derive(Clone)]
pub struct VoteLifecycle {
    ctx: BotContext,
}

impl VoteLifecycle {
    pub fn new(ctx: BotContext) -> Self {
        Self { ctx }
    }

    /// Persist a draft. Points may still be empty; activation checks them.
    pub fn create(
        &self,
        vote: NewVote,
        points: Vec<NewVotePoint>,
        role_filter: Vec<RoleId>,
    ) -> Result<VoteId> {
        if vote.text.trim().is_empty() {
            return Err(Error::Misconfigured("vote text is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for p in &points {
            if !seen.insert(&p.emoji) {
                return Err(Error::Misconfigured(format!(
                    "emoji {} is used by more than one option",
                    p.emoji
                )));
            }
        }
        let uses_default = vote.has_default || vote.win_threshold > 0;
        if uses_default && seen.contains(&&self.ctx.cfg.default_vote_emoji) {
            return Err(Error::Misconfigured(format!(
                "emoji {} is reserved for the default option",
                self.ctx.cfg.default_vote_emoji
            )));
        }

        let id = self.ctx.votes.insert_draft(&vote, &points, &role_filter)?;
        info!(server = %vote.server_id, vote = %id, points = points.len(), "vote drafted");
        Ok(id)
    }

    /// Draft → Active. Requires at least one point.
    pub fn activate(&self, id: VoteId, message: MessageId) -> Result<()> {
        let vote = self.load(id)?;
        ensure_activatable(&vote)?;

        if !self.ctx.votes.activate(id, message)? {
            return Err(Error::Misconfigured(format!(
                "vote {id} is no longer a draft"
            )));
        }
        info!(server = %vote.server_id, vote = %id, %message, "vote activated");
        Ok(())
    }

    /// Send the vote message, seed one reaction per option, then activate.
    pub async fn publish(&self, id: VoteId) -> Result<MessageId> {
        let vote = self.load(id)?;
        ensure_activatable(&vote)?;

        let message_id = self
            .ctx
            .platform
            .send_message(vote.channel_id, &self.render(&vote))
            .await?;
        let msg = MessageRef {
            channel_id: vote.channel_id,
            message_id,
        };

        for option in self.options(&vote) {
            if let Err(e) = self.ctx.platform.add_reaction(msg, &option.emoji).await {
                warn!(vote = %id, emoji = %option.emoji, error = %e, "failed to seed vote reaction");
            }
        }

        if let Err(e) = self.activate(id, message_id) {
            // The port cannot delete messages; the poll stays up without a live vote.
            warn!(
                vote = %id,
                channel = %vote.channel_id,
                message = %message_id,
                error = %e,
                "vote activation failed; published message is orphaned"
            );
            return Err(e);
        }
        Ok(message_id)
    }

    /// Active votes of `server` whose timer ran out at or before `now`.
    pub fn sweep_expired(&self, server: ServerId, now: DateTime<Utc>) -> Result<Vec<Vote>> {
        self.ctx.votes.list_expired(server, now)
    }

    /// Active → `outcome` (Completed or Expired), exactly once.
    ///
    /// Returns `None` when the vote was already finalised by someone else.
    /// A failing reactor fetch is logged and finalises with
    /// [`TallyResult::Unavailable`](crate::votes::TallyResult::Unavailable).
    pub async fn finalize(&self, id: VoteId, outcome: VoteState) -> Result<Option<Tally>> {
        if !matches!(outcome, VoteState::Completed | VoteState::Expired) {
            return Err(Error::Misconfigured(format!(
                "a vote cannot be finalised as {outcome}"
            )));
        }

        let vote = self.load(id)?;
        if vote.state != VoteState::Active {
            return Ok(None);
        }
        let tally = match self.tally(&vote).await {
            Ok(t) => t,
            Err(e) => {
                warn!(vote = %id, error = %e, "vote tally failed; closing without results");
                Tally::unavailable()
            }
        };

        if !self
            .ctx
            .votes
            .transition(id, &[VoteState::Active], outcome)?
        {
            return Ok(None);
        }

        let summary = tally.summary();
        info!(server = %vote.server_id, vote = %id, %outcome, total = tally.total_votes(), "vote finalised");
        self.ctx
            .audit
            .record(AuditEvent::vote_finalized(vote.server_id, id, &summary));

        if let Some(msg) = vote.message() {
            let text = format!("{}\n\n{summary}", self.render(&vote));
            if let Err(e) = self.ctx.platform.edit_message(msg, &text).await {
                warn!(vote = %id, error = %e, "failed to post vote result");
            }
        }

        Ok(Some(tally))
    }

    pub async fn complete(&self, id: VoteId) -> Result<Option<Tally>> {
        self.finalize(id, VoteState::Completed).await
    }

    /// Draft/Active → Deleted, purging points and role filter rows in the same write.
    pub fn delete(&self, id: VoteId) -> Result<()> {
        let vote = self.load(id)?;
        if !self
            .ctx
            .votes
            .delete(id, &[VoteState::Draft, VoteState::Active])?
        {
            return Err(Error::Misconfigured(format!(
                "vote {id} is already {}",
                vote.state
            )));
        }
        info!(server = %vote.server_id, vote = %id, "vote deleted");
        Ok(())
    }

    pub fn get(&self, id: VoteId) -> Result<Option<Vote>> {
        self.ctx.votes.get(id)
    }

    pub fn render(&self, vote: &Vote) -> String {
        let mut out = vote.text.trim().to_string();
        out.push('\n');
        for option in self.options(vote) {
            out.push('\n');
            out.push_str(&format!("{} {}", option.emoji, option.label));
        }
        if let Some(t) = vote.finish_time {
            out.push_str(&format!("\n\nEnds at {}", t.format("%Y-%m-%d %H:%M UTC")));
        }
        out
    }

    fn options(&self, vote: &Vote) -> Vec<VoteOption> {
        vote.options(
            &self.ctx.cfg.default_vote_emoji,
            &self.ctx.cfg.default_vote_label,
        )
    }

    async fn tally(&self, vote: &Vote) -> Result<Tally> {
        let Some(msg) = vote.message() else {
            return Err(Error::Misconfigured(format!(
                "vote {} has no message",
                vote.id
            )));
        };

        let mut counts = Vec::new();
        for option in self.options(vote) {
            let reactors = self.ctx.platform.list_reactors(msg, &option.emoji).await?;
            let votes = reactors
                .iter()
                .filter(|u| Some(**u) != self.ctx.cfg.bot_user_id)
                .count();
            counts.push(OptionCount { option, votes });
        }
        Ok(Tally::compute(counts, vote.win_threshold))
    }

    fn load(&self, id: VoteId) -> Result<Vote> {
        self.ctx
            .votes
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("vote {id}")))
    }
}

fn ensure_activatable(vote: &Vote) -> Result<()> {
    if vote.state != VoteState::Draft {
        return Err(Error::Misconfigured(format!(
            "vote {} is {}, not a draft",
            vote.id, vote.state
        )));
    }
    if vote.points.is_empty() {
        return Err(Error::Misconfigured(format!(
            "vote {} has no options",
            vote.id
        )));
    }
    Ok(())
}
