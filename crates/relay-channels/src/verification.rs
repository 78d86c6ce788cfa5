//! Verification challenge lifecycle
//!
//! Variants that prove channel ownership out of band (bridge device
//! linking) do it through short-lived codes. The manager owns every timer
//! involved: a completion poll per connection and one global expiry
//! sweep. A connection holds at most one non-expired pending challenge;
//! issuing a new code supersedes the previous one.

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use relay_common::{TaskRegistry, VerificationConfig};
use relay_core::{
    ChallengeId, ChallengeStatus, Collection, ConnectionId, DomainError, Filter, Order,
    StoreGateway, VerificationChallenge,
};

use crate::records::ChallengeRecord;

/// Challenge lifecycle notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationEvent {
    Completed {
        connection_id: ConnectionId,
        challenge_id: ChallengeId,
    },
    Expired {
        connection_id: ConnectionId,
        challenge_id: ChallengeId,
    },
}

/// Verification challenge manager
pub struct VerificationManager {
    gateway: Arc<dyn StoreGateway>,
    config: VerificationConfig,
    polls: Arc<TaskRegistry<ConnectionId>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<VerificationEvent>,
}

impl VerificationManager {
    /// Create a manager over the given gateway
    pub fn new(gateway: Arc<dyn StoreGateway>, config: VerificationConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            gateway,
            config,
            polls: Arc::new(TaskRegistry::new()),
            sweeper: Mutex::new(None),
            events,
        }
    }

    /// Get a receiver for challenge lifecycle notifications
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<VerificationEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Issuance
    // =========================================================================

    /// Issue a fresh verification code for a connection.
    ///
    /// Any prior pending challenge for the same connection is marked
    /// expired first, and its completion poll is superseded, so at most one
    /// pending challenge exists per connection at any time.
    #[instrument(skip(self), fields(connection_id = %connection_id))]
    pub async fn generate_code(
        &self,
        connection_id: ConnectionId,
    ) -> Result<VerificationChallenge, DomainError> {
        self.expire_pending_for(connection_id).await?;

        let challenge =
            VerificationChallenge::issue(connection_id, self.config.code_len, self.config.validity());
        self.gateway
            .insert(Collection::Challenges, ChallengeRecord::to_row(&challenge))
            .await?;
        info!(challenge_id = %challenge.id, "Verification code issued");

        self.polls
            .register(connection_id, self.spawn_poll(challenge.clone()));
        Ok(challenge)
    }

    /// The pending challenge for a connection, if one exists
    pub async fn active_challenge(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Option<VerificationChallenge>, DomainError> {
        let rows = self
            .gateway
            .select(
                Collection::Challenges,
                Filter::field("connection_id", json!(connection_id))
                    .and("status", json!(ChallengeStatus::Pending)),
                Some(Order::desc("created_at")),
            )
            .await?;
        match rows.first() {
            Some(row) => Ok(Some(ChallengeRecord::from_row(row)?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Record a completion attempt arriving from the channel side.
    ///
    /// The status write is all that happens here; the completion poll
    /// observes it and emits the event, the same as when an external
    /// backend writes the row directly.
    #[instrument(skip(self, code), fields(challenge_id = %challenge_id))]
    pub async fn complete_challenge(
        &self,
        challenge_id: ChallengeId,
        code: &str,
    ) -> Result<(), DomainError> {
        let challenge = self.fetch(challenge_id).await?;

        match challenge.status {
            // A repeated completion is a no-op
            ChallengeStatus::Completed => return Ok(()),
            ChallengeStatus::Expired => return Err(DomainError::ChallengeExpired),
            ChallengeStatus::Pending => {}
        }
        if challenge.is_expired_at(Utc::now()) {
            self.mark_expired(&challenge).await?;
            return Err(DomainError::ChallengeExpired);
        }
        if challenge.code != code {
            return Err(DomainError::Validation("verification code mismatch".into()));
        }

        self.gateway
            .update(
                Collection::Challenges,
                Filter::field("id", json!(challenge_id)),
                json!({ "status": ChallengeStatus::Completed }),
            )
            .await?;
        info!("Verification challenge completed");
        Ok(())
    }

    // =========================================================================
    // Background tasks
    // =========================================================================

    /// Start the periodic expiry sweep. Idempotent; a running sweeper is
    /// superseded.
    pub fn start_sweeper(&self) {
        let gateway = Arc::clone(&self.gateway);
        let polls = Arc::clone(&self.polls);
        let events = self.events.clone();
        let interval = self.config.sweep_interval();

        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if let Err(e) = Self::sweep_once(&gateway, &polls, &events).await {
                    warn!(error = %e, "Expiry sweep failed");
                }
            }
        });

        let mut slot = self.sweeper.lock();
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }

    /// Stop every poll and the sweeper
    pub fn shutdown(&self) {
        let stopped = self.polls.stop_all();
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.abort();
        }
        debug!(polls = stopped, "Verification manager shut down");
    }

    /// Number of live completion polls
    pub fn active_polls(&self) -> usize {
        self.polls.len()
    }

    /// Check whether a completion poll is live for a connection
    pub fn is_polling(&self, connection_id: ConnectionId) -> bool {
        self.polls.is_running(&connection_id)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Completion poll for one challenge. Ends on completion, on observed
    /// expiry, or at an absolute cap past the expiry time; a challenge
    /// completed late within the grace window still gets its event.
    fn spawn_poll(&self, challenge: VerificationChallenge) -> JoinHandle<()> {
        let gateway = Arc::clone(&self.gateway);
        let events = self.events.clone();
        let interval = self.config.poll_interval();
        let deadline = challenge.expires_at
            + chrono::Duration::from_std(self.config.poll_grace())
                .unwrap_or_else(|_| chrono::Duration::zero());

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if Utc::now() >= deadline {
                    debug!(challenge_id = %challenge.id, "Completion poll hit grace cap");
                    return;
                }

                let rows = match gateway
                    .select(
                        Collection::Challenges,
                        Filter::field("id", json!(challenge.id)),
                        None,
                    )
                    .await
                {
                    Ok(rows) => rows,
                    Err(e) => {
                        warn!(error = %e, "Completion poll query failed");
                        continue;
                    }
                };
                let Some(row) = rows.first() else { return };
                let Ok(current) = ChallengeRecord::from_row(row) else {
                    return;
                };

                match current.status {
                    ChallengeStatus::Completed => {
                        info!(challenge_id = %challenge.id, "Challenge completion observed");
                        let _ = events.send(VerificationEvent::Completed {
                            connection_id: challenge.connection_id,
                            challenge_id: challenge.id,
                        });
                        return;
                    }
                    ChallengeStatus::Expired => return,
                    ChallengeStatus::Pending => {}
                }
            }
        })
    }

    async fn sweep_once(
        gateway: &Arc<dyn StoreGateway>,
        polls: &TaskRegistry<ConnectionId>,
        events: &broadcast::Sender<VerificationEvent>,
    ) -> Result<(), DomainError> {
        let rows = gateway
            .select(
                Collection::Challenges,
                Filter::field("status", json!(ChallengeStatus::Pending)),
                None,
            )
            .await?;

        let now = Utc::now();
        for row in &rows {
            let Ok(challenge) = ChallengeRecord::from_row(row) else {
                continue;
            };
            if !challenge.is_expired_at(now) {
                continue;
            }
            gateway
                .update(
                    Collection::Challenges,
                    Filter::field("id", json!(challenge.id)),
                    json!({ "status": ChallengeStatus::Expired }),
                )
                .await?;
            polls.stop(&challenge.connection_id);
            info!(challenge_id = %challenge.id, "Challenge expired by sweep");
            let _ = events.send(VerificationEvent::Expired {
                connection_id: challenge.connection_id,
                challenge_id: challenge.id,
            });
        }
        Ok(())
    }

    async fn expire_pending_for(&self, connection_id: ConnectionId) -> Result<(), DomainError> {
        let superseded = self
            .gateway
            .update(
                Collection::Challenges,
                Filter::field("connection_id", json!(connection_id))
                    .and("status", json!(ChallengeStatus::Pending)),
                json!({ "status": ChallengeStatus::Expired }),
            )
            .await?;
        if superseded > 0 {
            debug!(count = superseded, "Prior pending challenges superseded");
        }
        Ok(())
    }

    async fn fetch(&self, challenge_id: ChallengeId) -> Result<VerificationChallenge, DomainError> {
        let rows = self
            .gateway
            .select(
                Collection::Challenges,
                Filter::field("id", json!(challenge_id)),
                None,
            )
            .await?;
        let row = rows
            .first()
            .ok_or(DomainError::ChallengeNotFound(challenge_id))?;
        ChallengeRecord::from_row(row)
    }

    async fn mark_expired(&self, challenge: &VerificationChallenge) -> Result<(), DomainError> {
        self.gateway
            .update(
                Collection::Challenges,
                Filter::field("id", json!(challenge.id)),
                json!({ "status": ChallengeStatus::Expired }),
            )
            .await?;
        self.polls.stop(&challenge.connection_id);
        Ok(())
    }
}

impl Drop for VerificationManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
