//! Inbound event dispatch.
//!
//! Commands are looked up in a table of [`CommandDescriptor`]s and gated by
//! [`AccessResolver`](crate::access::AccessResolver). Reactions go to the
//! vote governor when the message carries an active vote, and to the
//! threshold assigner otherwise.

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    access::AccessRequest,
    audit::AuditEvent,
    context::BotContext,
    domain::{AclMode, ChannelId, EmojiRef, EntityKind, EntityRef, RoleId, ServerId, UserId, VoteId},
    errors::Error,
    governor::{GovernorVerdict, ReactionGovernor},
    platform::ReactionEvent,
    rights::normalize_prefix,
    threshold::{ThresholdOutcome, ThresholdRoleAssigner},
    votes::VoteLifecycle,
    Result,
};

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Reply>> + Send>>;
pub type Handler = fn(BotContext, Invocation) -> HandlerFuture;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommandFlags {
    /// Only bot owners and server admins; command rights are not consulted.
    pub owner_only: bool,
    /// Honour channel/category rights for this command.
    pub strict_by_channel: bool,
}

#[derive(Clone)]
pub struct CommandDescriptor {
    pub prefix: &'static str,
    pub flags: CommandFlags,
    pub handler: Handler,
}

/// One parsed command message and who sent it where.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub server: ServerId,
    pub channel: ChannelId,
    pub category: Option<ChannelId>,
    pub actor: UserId,
    pub actor_roles: Vec<RoleId>,
    pub actor_is_admin: bool,
    pub prefix: String,
    pub args: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    /// A refused operation the user should hear about (bad arguments, invalid state).
    Rejected(String),
    Denied,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReactionOutcome {
    Ignored,
    Vote(GovernorVerdict),
    Threshold(ThresholdOutcome),
}

/// Split `!cmd arg1 arg2` (or `/cmd@bot ...`) into a lowercase prefix and arguments.
pub fn parse_command(text: &str) -> Option<(String, Vec<String>)> {
    let text = text.trim();
    let body = text.strip_prefix('!').or_else(|| text.strip_prefix('/'))?;
    let mut parts = body.split_whitespace();
    let first = parts.next()?;
    let prefix = normalize_prefix(first.split('@').next().unwrap_or(""));
    if prefix.is_empty() {
        return None;
    }
    Some((prefix, parts.map(str::to_string).collect()))
}

#[derive(Clone)]
pub struct Router {
    ctx: BotContext,
    commands: Arc<HashMap<&'static str, CommandDescriptor>>,
    governor: ReactionGovernor,
    threshold: ThresholdRoleAssigner,
}

impl Router {
    pub fn new(ctx: BotContext) -> Self {
        Self::with_commands(ctx, builtin_commands())
    }

    pub fn with_commands(ctx: BotContext, commands: Vec<CommandDescriptor>) -> Self {
        let commands = commands.into_iter().map(|d| (d.prefix, d)).collect();
        Self {
            governor: ReactionGovernor::new(ctx.clone()),
            threshold: ThresholdRoleAssigner::new(ctx.clone()),
            commands: Arc::new(commands),
            ctx,
        }
    }

    pub fn context(&self) -> &BotContext {
        &self.ctx
    }

    pub async fn on_command(&self, mut inv: Invocation) -> Result<Reply> {
        inv.prefix = normalize_prefix(&inv.prefix);
        let Some(desc) = self.commands.get(inv.prefix.as_str()).cloned() else {
            return Ok(Reply::Unknown);
        };

        if desc.flags.strict_by_channel && inv.category.is_none() {
            inv.category = match self.ctx.platform.channel_category(inv.channel).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(channel = %inv.channel, error = %e, "category lookup failed");
                    None
                }
            };
        }

        let allowed = if desc.flags.owner_only {
            self.ctx.cfg.is_owner(inv.actor) || inv.actor_is_admin
        } else {
            self.ctx.access().can_execute(&AccessRequest {
                server: inv.server,
                actor: inv.actor,
                actor_roles: &inv.actor_roles,
                actor_is_admin: inv.actor_is_admin,
                command_prefix: &inv.prefix,
                channel: inv.channel,
                category: inv.category,
                strict_by_channel: desc.flags.strict_by_channel,
            })
        };
        if !allowed {
            info!(server = %inv.server, actor = %inv.actor, prefix = %inv.prefix, "command denied");
            return Ok(Reply::Denied);
        }

        match (desc.handler)(self.ctx.clone(), inv).await {
            Err(Error::Misconfigured(msg)) | Err(Error::NotFound(msg)) => Ok(Reply::Rejected(msg)),
            other => other,
        }
    }

    pub async fn on_reaction_add(&self, event: &ReactionEvent) -> Result<ReactionOutcome> {
        if Some(event.user_id) == self.ctx.cfg.bot_user_id {
            return Ok(ReactionOutcome::Ignored);
        }

        let Some(vote) = self.ctx.votes.find_active_by_message(event.message_id)? else {
            let outcome = self.threshold.on_reaction_add(event).await?;
            return Ok(ReactionOutcome::Threshold(outcome));
        };

        let verdict = self.governor.on_reaction_add(&vote, event, None).await?;
        Ok(ReactionOutcome::Vote(verdict))
    }

    /// Handle a reaction on its own task. Failures are logged and leave state unchanged.
    pub fn spawn_reaction(&self, event: ReactionEvent) -> JoinHandle<()> {
        let router = self.clone();
        tokio::spawn(async move {
            match router.on_reaction_add(&event).await {
                Ok(outcome) => debug!(message = %event.message_id, ?outcome, "reaction handled"),
                Err(e) => warn!(
                    server = %event.server_id,
                    message = %event.message_id,
                    user = %event.user_id,
                    error = %e,
                    "reaction handling abandoned"
                ),
            }
        })
    }
}

// ============== Built-in commands ==============

pub fn builtin_commands() -> Vec<CommandDescriptor> {
    let admin = CommandFlags {
        owner_only: true,
        strict_by_channel: false,
    };
    let scoped = CommandFlags {
        owner_only: false,
        strict_by_channel: true,
    };
    vec![
        CommandDescriptor {
            prefix: "allow",
            flags: admin,
            handler: allow_cmd,
        },
        CommandDescriptor {
            prefix: "deny",
            flags: admin,
            handler: deny_cmd,
        },
        CommandDescriptor {
            prefix: "rights",
            flags: CommandFlags::default(),
            handler: rights_cmd,
        },
        CommandDescriptor {
            prefix: "aclmode",
            flags: admin,
            handler: aclmode_cmd,
        },
        CommandDescriptor {
            prefix: "vote-end",
            flags: scoped,
            handler: vote_end_cmd,
        },
        CommandDescriptor {
            prefix: "vote-delete",
            flags: scoped,
            handler: vote_delete_cmd,
        },
        CommandDescriptor {
            prefix: "control",
            flags: admin,
            handler: control_cmd,
        },
    ]
}

fn rejected<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::Misconfigured(msg.into()))
}

/// Accepts raw ids and `<@id>`, `<@!id>`, `<@&id>`, `<#id>` mentions.
fn parse_snowflake(raw: &str) -> Result<u64> {
    let trimmed = raw
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim_start_matches(['@', '#', '!', '&']);
    trimmed
        .parse::<u64>()
        .or_else(|_| rejected(format!("not an id: {raw}")))
}

fn arg(inv: &Invocation, i: usize, usage: &str) -> Result<String> {
    match inv.args.get(i) {
        Some(a) => Ok(a.clone()),
        None => rejected(format!("usage: {usage}")),
    }
}

fn allow_cmd(ctx: BotContext, inv: Invocation) -> HandlerFuture {
    Box::pin(async move { change_right(&ctx, &inv, true) })
}

fn deny_cmd(ctx: BotContext, inv: Invocation) -> HandlerFuture {
    Box::pin(async move { change_right(&ctx, &inv, false) })
}

fn change_right(ctx: &BotContext, inv: &Invocation, grant: bool) -> Result<Reply> {
    let usage = format!("{} <user|role|channel|category> <id> <command>", inv.prefix);
    let kind: EntityKind = arg(inv, 0, &usage)?.parse()?;
    let id = parse_snowflake(&arg(inv, 1, &usage)?)?;
    let command = normalize_prefix(&arg(inv, 2, &usage)?);
    let entity = EntityRef { kind, id };

    let changed = if grant {
        ctx.rights.allow(inv.server, entity, &command)
    } else {
        ctx.rights.deny(inv.server, entity, &command)
    };
    if !changed {
        let state = if grant { "already allowed" } else { "not allowed" };
        return Ok(Reply::Text(format!("{entity} is {state} for `{command}`.")));
    }

    ctx.audit.record(AuditEvent::right_changed(
        inv.server, inv.actor, &command, entity, grant,
    ));
    let verb = if grant { "may now use" } else { "may no longer use" };
    Ok(Reply::Text(format!("{entity} {verb} `{command}`.")))
}

fn rights_cmd(ctx: BotContext, inv: Invocation) -> HandlerFuture {
    Box::pin(async move {
        let filter = inv.args.first().map(|a| normalize_prefix(a));
        let rights: Vec<_> = ctx
            .rights
            .list_server(inv.server)
            .into_iter()
            .filter(|r| filter.as_ref().map_or(true, |f| *f == r.command_prefix))
            .collect();
        if rights.is_empty() {
            return Ok(Reply::Text("No command rights.".to_string()));
        }

        let mut out = format!("ACL mode: {}", ctx.rights.acl_mode(inv.server).as_str());
        for r in rights {
            out.push_str(&format!("\n{} → {}", r.command_prefix, r.entity));
        }
        Ok(Reply::Text(out))
    })
}

fn aclmode_cmd(ctx: BotContext, inv: Invocation) -> HandlerFuture {
    Box::pin(async move {
        let Some(raw) = inv.args.first() else {
            let mode = ctx.rights.acl_mode(inv.server);
            return Ok(Reply::Text(format!("ACL mode: {}", mode.as_str())));
        };
        let mode: AclMode = raw.parse()?;
        ctx.rights.set_acl_mode(inv.server, mode)?;
        info!(server = %inv.server, actor = %inv.actor, mode = mode.as_str(), "acl mode changed");
        Ok(Reply::Text(format!("ACL mode set to {}.", mode.as_str())))
    })
}

fn vote_in_server(ctx: &BotContext, inv: &Invocation) -> Result<VoteId> {
    let raw = arg(inv, 0, &format!("{} <vote id>", inv.prefix))?;
    let id = raw
        .parse::<i64>()
        .map(VoteId)
        .or_else(|_| rejected(format!("not a vote id: {raw}")))?;
    match ctx.votes.get(id)? {
        Some(v) if v.server_id == inv.server => Ok(id),
        _ => Err(Error::NotFound(format!("vote {id}"))),
    }
}

fn vote_end_cmd(ctx: BotContext, inv: Invocation) -> HandlerFuture {
    Box::pin(async move {
        let id = vote_in_server(&ctx, &inv)?;
        match VoteLifecycle::new(ctx).complete(id).await? {
            Some(tally) => Ok(Reply::Text(tally.summary())),
            None => rejected(format!("vote {id} is not active")),
        }
    })
}

fn vote_delete_cmd(ctx: BotContext, inv: Invocation) -> HandlerFuture {
    Box::pin(async move {
        let id = vote_in_server(&ctx, &inv)?;
        VoteLifecycle::new(ctx).delete(id)?;
        Ok(Reply::Text(format!("Vote {id} deleted.")))
    })
}

fn control_cmd(ctx: BotContext, inv: Invocation) -> HandlerFuture {
    Box::pin(async move {
        const USAGE: &str =
            "control <show|role <id>|threshold <n>|emoji <emoji>|add <user>|remove <user>|list>";
        let assigner = ThresholdRoleAssigner::new(ctx);
        let sub = arg(&inv, 0, USAGE)?.to_lowercase();
        let value = inv.args.get(1).cloned();

        let mut settings = assigner.settings(inv.server)?;
        match (sub.as_str(), value) {
            ("show", _) => {
                let role = settings
                    .assign_role
                    .map_or("unset".to_string(), |r| r.to_string());
                let emoji = settings
                    .emoji
                    .as_ref()
                    .map_or("unset".to_string(), |e| e.to_string());
                return Ok(Reply::Text(format!(
                    "role: {role}\nthreshold: {}\nemoji: {emoji}\nactive: {}",
                    settings.threshold,
                    settings.is_configured()
                )));
            }
            ("list", _) => {
                let users = assigner.control_users(inv.server)?;
                if users.is_empty() {
                    return Ok(Reply::Text("No control users.".to_string()));
                }
                let list: Vec<String> = users.iter().map(|u| u.to_string()).collect();
                return Ok(Reply::Text(format!("Control users: {}", list.join(", "))));
            }
            ("add", Some(v)) => {
                let user = UserId(parse_snowflake(&v)?);
                let added = assigner.add_control_user(inv.server, user)?;
                let text = if added { "added" } else { "already a control user" };
                return Ok(Reply::Text(format!("{user}: {text}.")));
            }
            ("remove", Some(v)) => {
                let user = UserId(parse_snowflake(&v)?);
                let removed = assigner.remove_control_user(inv.server, user)?;
                let text = if removed { "removed" } else { "not a control user" };
                return Ok(Reply::Text(format!("{user}: {text}.")));
            }
            ("role", Some(v)) => settings.assign_role = Some(RoleId(parse_snowflake(&v)?)),
            ("threshold", Some(v)) => {
                settings.threshold = v
                    .parse::<u32>()
                    .or_else(|_| rejected(format!("not a threshold: {v}")))?;
            }
            ("emoji", Some(v)) => {
                settings.emoji =
                    Some(EmojiRef::parse(&v).ok_or_else(|| Error::Misconfigured(USAGE.into()))?);
            }
            _ => return rejected(format!("usage: {USAGE}")),
        }

        assigner.set_settings(&settings)?;
        let state = if settings.is_configured() {
            "active"
        } else {
            "inactive until role, threshold and emoji are set"
        };
        Ok(Reply::Text(format!("Control settings updated ({state}).")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{MessageId, MessageRef},
        governor::RemovalReason,
        platform::ChatPlatform,
        testing::{harness, Harness, BOT, OWNER},
        threshold::ControlSettings,
        votes::{NewVote, NewVotePoint, VoteState},
    };

    const SERVER: ServerId = ServerId(1);
    const CHANNEL: ChannelId = ChannelId(10);
    const MEMBER: UserId = UserId(7);

    fn inv(actor: UserId, text: &str) -> Invocation {
        let (prefix, args) = parse_command(text).unwrap();
        Invocation {
            server: SERVER,
            channel: CHANNEL,
            category: None,
            actor,
            actor_roles: vec![],
            actor_is_admin: false,
            prefix,
            args,
        }
    }

    fn text(reply: Reply) -> String {
        match reply {
            Reply::Text(t) => t,
            other => panic!("expected text reply, got {other:?}"),
        }
    }

    #[test]
    fn parse_command_strips_sigil_and_bot_name() {
        assert_eq!(
            parse_command("/Allow@modbot role 5 ban"),
            Some((
                "allow".to_string(),
                vec!["role".to_string(), "5".to_string(), "ban".to_string()]
            ))
        );
        assert_eq!(parse_command("!rights"), Some(("rights".to_string(), vec![])));
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("! "), None);
    }

    #[test]
    fn snowflakes_accept_mentions() {
        assert_eq!(parse_snowflake("<@&42>").unwrap(), 42);
        assert_eq!(parse_snowflake("<@!42>").unwrap(), 42);
        assert_eq!(parse_snowflake("<#42>").unwrap(), 42);
        assert!(parse_snowflake("abc").is_err());
    }

    #[tokio::test]
    async fn unknown_and_unauthorised_commands() {
        let Harness { ctx, .. } = harness();
        let router = Router::new(ctx);

        assert_eq!(
            router.on_command(inv(OWNER, "!nope")).await.unwrap(),
            Reply::Unknown
        );
        assert_eq!(
            router.on_command(inv(MEMBER, "!rights")).await.unwrap(),
            Reply::Denied
        );
        assert_eq!(
            router
                .on_command(inv(MEMBER, "!allow user 7 rights"))
                .await
                .unwrap(),
            Reply::Denied
        );
    }

    #[tokio::test]
    async fn owner_grants_and_revokes_rights() {
        let Harness { ctx, .. } = harness();
        let router = Router::new(ctx.clone());

        let granted = text(
            router
                .on_command(inv(OWNER, "!allow user <@7> Rights"))
                .await
                .unwrap(),
        );
        assert!(granted.contains("may now use"));
        assert!(text(
            router
                .on_command(inv(OWNER, "!allow user 7 rights"))
                .await
                .unwrap()
        )
        .contains("already allowed"));

        let listing = text(router.on_command(inv(MEMBER, "!rights")).await.unwrap());
        assert!(listing.contains("rights → user:7"));

        router
            .on_command(inv(OWNER, "!deny user 7 rights"))
            .await
            .unwrap();
        assert_eq!(
            router.on_command(inv(MEMBER, "!rights")).await.unwrap(),
            Reply::Denied
        );

        let audit = std::fs::read_to_string(ctx.audit.path()).unwrap();
        assert_eq!(audit.matches("right_changed").count(), 2);
    }

    #[tokio::test]
    async fn admins_manage_without_rights_and_bad_args_are_rejected() {
        let Harness { ctx, .. } = harness();
        let router = Router::new(ctx.clone());
        let mut admin = inv(UserId(8), "!aclmode classic");
        admin.actor_is_admin = true;

        assert!(text(router.on_command(admin.clone()).await.unwrap()).contains("classic"));
        assert_eq!(ctx.rights.acl_mode(SERVER), AclMode::Classic);

        admin.args = vec!["sideways".into()];
        assert!(matches!(
            router.on_command(admin).await.unwrap(),
            Reply::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn vote_commands_respect_channel_scoping() {
        let Harness { ctx, platform, .. } = harness();
        let router = Router::new(ctx.clone());
        let votes = VoteLifecycle::new(ctx.clone());
        let id = votes
            .create(
                NewVote {
                    server_id: SERVER,
                    channel_id: CHANNEL,
                    text: "Ship it?".into(),
                    finish_time: None,
                    is_exceptional: false,
                    has_default: false,
                    win_threshold: 0,
                },
                vec![NewVotePoint::new("Yes", EmojiRef::Unicode("✅".into()))],
                vec![],
            )
            .unwrap();
        votes.publish(id).await.unwrap();

        let cmd = format!("!vote-end {}", id.0);
        ctx.rights.allow(SERVER, EntityRef::user(MEMBER), "vote-end");
        ctx.rights
            .allow(SERVER, EntityRef::category(ChannelId(99)), "vote-end");

        // Channel 10 sits outside the allowed category.
        assert_eq!(
            router.on_command(inv(MEMBER, &cmd)).await.unwrap(),
            Reply::Denied
        );

        platform.set_category(CHANNEL, ChannelId(99));
        let summary = text(router.on_command(inv(MEMBER, &cmd)).await.unwrap());
        assert!(summary.contains("No votes were cast."));
        assert_eq!(votes.get(id).unwrap().unwrap().state, VoteState::Completed);

        assert!(matches!(
            router.on_command(inv(MEMBER, &cmd)).await.unwrap(),
            Reply::Rejected(_)
        ));
        assert!(matches!(
            router
                .on_command(inv(OWNER, "!vote-delete 999"))
                .await
                .unwrap(),
            Reply::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn control_command_configures_threshold() {
        let Harness { ctx, .. } = harness();
        let router = Router::new(ctx.clone());
        for cmd in [
            "!control role <@&77>",
            "!control threshold 2",
            "!control add 11",
            "!control add 12",
        ] {
            router.on_command(inv(OWNER, cmd)).await.unwrap();
        }
        let last = text(
            router
                .on_command(inv(OWNER, "!control emoji ⭐"))
                .await
                .unwrap(),
        );
        assert!(last.contains("(active)"));

        let settings = ctx.control.settings(SERVER).unwrap().unwrap();
        assert_eq!(
            settings,
            ControlSettings {
                server_id: SERVER,
                assign_role: Some(RoleId(77)),
                threshold: 2,
                emoji: Some(EmojiRef::Unicode("⭐".into())),
            }
        );
        let list = text(router.on_command(inv(OWNER, "!control list")).await.unwrap());
        assert_eq!(list, "Control users: 11, 12");
    }

    fn reaction(user: UserId, message: MessageId, emoji: &str) -> ReactionEvent {
        ReactionEvent {
            server_id: SERVER,
            channel_id: CHANNEL,
            message_id: message,
            user_id: user,
            emoji: EmojiRef::Unicode(emoji.into()),
        }
    }

    #[tokio::test]
    async fn reactions_route_to_governor_or_threshold() {
        let Harness { ctx, platform, .. } = harness();
        let router = Router::new(ctx.clone());
        let votes = VoteLifecycle::new(ctx.clone());
        let id = votes
            .create(
                NewVote {
                    server_id: SERVER,
                    channel_id: CHANNEL,
                    text: "Members only".into(),
                    finish_time: None,
                    is_exceptional: false,
                    has_default: false,
                    win_threshold: 0,
                },
                vec![NewVotePoint::new("Yes", EmojiRef::Unicode("✅".into()))],
                vec![RoleId(5)],
            )
            .unwrap();
        let message = votes.publish(id).await.unwrap();

        assert_eq!(
            router
                .on_reaction_add(&reaction(BOT, message, "✅"))
                .await
                .unwrap(),
            ReactionOutcome::Ignored
        );
        assert_eq!(
            router
                .on_reaction_add(&reaction(MEMBER, message, "✅"))
                .await
                .unwrap(),
            ReactionOutcome::Vote(GovernorVerdict::Removed(RemovalReason::RoleFilter))
        );
        platform.set_roles(SERVER, MEMBER, vec![RoleId(5)]);
        assert_eq!(
            router
                .on_reaction_add(&reaction(MEMBER, message, "✅"))
                .await
                .unwrap(),
            ReactionOutcome::Vote(GovernorVerdict::Accepted)
        );

        assert_eq!(
            router
                .on_reaction_add(&reaction(MEMBER, MessageId(4242), "⭐"))
                .await
                .unwrap(),
            ReactionOutcome::Threshold(ThresholdOutcome::NotControlUser)
        );
    }

    #[tokio::test]
    async fn concurrent_threshold_reactions_grant_the_role_once() {
        let Harness { ctx, platform, .. } = harness();
        let router = Router::new(ctx.clone());
        let assigner = ThresholdRoleAssigner::new(ctx);
        assigner
            .set_settings(&ControlSettings {
                server_id: SERVER,
                assign_role: Some(RoleId(77)),
                threshold: 3,
                emoji: Some(EmojiRef::Unicode("⭐".into())),
            })
            .unwrap();
        let message = MessageId(300);
        let msg = MessageRef {
            channel_id: CHANNEL,
            message_id: message,
        };
        let author = UserId(50);
        platform.set_author(msg, author);
        for u in [11, 12, 13, 14] {
            assigner.add_control_user(SERVER, UserId(u)).unwrap();
            platform.react(msg, &EmojiRef::Unicode("⭐".into()), UserId(u));
        }
        // Both events see the full reactor list before either grants.
        platform.set_reactor_delay(std::time::Duration::from_millis(20));

        let a = router.spawn_reaction(reaction(UserId(13), message, "⭐"));
        let b = router.spawn_reaction(reaction(UserId(14), message, "⭐"));
        a.await.unwrap();
        b.await.unwrap();

        let grants = platform.granted_roles().len();
        assert!((1..=2).contains(&grants));
        assert_eq!(
            platform.member_roles(SERVER, author).await.unwrap(),
            vec![RoleId(77)]
        );
    }

    #[tokio::test]
    async fn invalid_emoji_removed_even_when_role_lookup_fails() {
        let Harness { ctx, platform, .. } = harness();
        let router = Router::new(ctx.clone());
        let votes = VoteLifecycle::new(ctx);
        let id = votes
            .create(
                NewVote {
                    server_id: SERVER,
                    channel_id: CHANNEL,
                    text: "q".into(),
                    finish_time: None,
                    is_exceptional: false,
                    has_default: false,
                    win_threshold: 0,
                },
                vec![NewVotePoint::new("Yes", EmojiRef::Unicode("✅".into()))],
                vec![],
            )
            .unwrap();
        let message = votes.publish(id).await.unwrap();
        platform.fail_member_roles(true);

        let handle = router.spawn_reaction(reaction(MEMBER, message, "🍌"));
        handle.await.unwrap();
        assert_eq!(platform.removed_reactions().len(), 1);
        assert_eq!(
            router
                .on_reaction_add(&reaction(MEMBER, message, "✅"))
                .await
                .unwrap(),
            ReactionOutcome::Vote(GovernorVerdict::Accepted)
        );
    }
}
