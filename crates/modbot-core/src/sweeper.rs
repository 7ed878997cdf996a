//! Periodic expiry of timed votes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    context::BotContext,
    votes::{VoteLifecycle, VoteState},
    Result,
};

/// A single repeating task that finalises expired votes.
///
/// Cancellation is only observed between ticks, so [`ExpirySweeper::shutdown`]
/// waits for a run that is already in flight.
#[derive(Clone)]
pub struct ExpirySweeper {
    inner: Arc<SweeperInner>,
}

struct SweeperInner {
    ctx: BotContext,
    votes: VoteLifecycle,
    state: Mutex<SweeperState>,
}

#[derive(Default)]
struct SweeperState {
    handle: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
}

impl ExpirySweeper {
    pub fn new(ctx: BotContext) -> Self {
        Self {
            inner: Arc::new(SweeperInner {
                votes: VoteLifecycle::new(ctx.clone()),
                ctx,
                state: Mutex::new(SweeperState::default()),
            }),
        }
    }

    /// Start ticking every `cfg.sweep_interval`. No-op when already running.
    pub async fn start(&self) {
        let mut st = self.inner.state.lock().await;
        if st.handle.is_some() {
            return;
        }

        let tok = CancellationToken::new();
        st.cancel = Some(tok.clone());
        let period = self.inner.ctx.cfg.sweep_interval;
        let sweeper = self.clone();
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = tok.cancelled() => break,
                    _ = tick.tick() => {
                        if let Err(e) = sweeper.run_once(Utc::now()).await {
                            warn!(error = %e, "vote sweep failed");
                        }
                    }
                }
            }
            debug!("vote sweeper stopped");
        });

        st.handle = Some(handle);
        info!(interval_ms = period.as_millis() as u64, "vote sweeper started");
    }

    pub async fn is_running(&self) -> bool {
        self.inner.state.lock().await.handle.is_some()
    }

    /// Finalise every vote whose timer ran out at or before `now`.
    ///
    /// Returns how many votes this run moved to Expired. A vote whose
    /// finalisation hits a storage error stays Active until the next tick.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut expired = 0usize;
        for server in self.inner.ctx.votes.servers_with_active_votes()? {
            let due = match self.inner.votes.sweep_expired(server, now) {
                Ok(v) => v,
                Err(e) => {
                    warn!(%server, error = %e, "expired vote listing failed");
                    continue;
                }
            };
            for vote in due {
                match self.inner.votes.finalize(vote.id, VoteState::Expired).await {
                    Ok(Some(_)) => expired += 1,
                    Ok(None) => {}
                    Err(e) => warn!(%server, vote = %vote.id, error = %e, "vote expiry deferred"),
                }
            }
        }
        if expired > 0 {
            info!(expired, "expired votes finalised");
        }
        Ok(expired)
    }

    /// Cancel the timer and wait for the in-flight run to finish.
    pub async fn shutdown(&self) {
        let (tok, handle) = {
            let mut st = self.inner.state.lock().await;
            (st.cancel.take(), st.handle.take())
        };
        if let Some(tok) = tok {
            tok.cancel();
        }
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "vote sweeper task failed");
            }
        }
    }
}
