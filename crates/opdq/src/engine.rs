//! Admission and promotion engines.
//!
//! Every decision runs inside the target slot's exclusive scope: read the
//! confirmed count, compare, write status + seat number, and (for
//! displacement) write the incumbent's new status, all under one lock
//! acquisition. No observer that takes the slot lock ever sees the capacity
//! invariant violated or a half-applied decision.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;

use crate::events::{EntityType, Event, EventLog, EventType};
use crate::locks::{LockTimeout, SlotLocks};
use crate::slot::SlotId;
use crate::store::{StoreError, TokenStore};
use crate::token::{Token, TokenId, TokenStatus};

/// Outcome of an admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirmed { seat_number: u32 },
    Waitlisted,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AdmissionError {
    #[error("slot {0} not found")]
    SlotNotFound(SlotId),
    #[error("token {0} not found")]
    TokenNotFound(TokenId),
    #[error("token {token} is {status} - {reason}")]
    InvalidState {
        token: TokenId,
        status: &'static str,
        reason: &'static str,
    },
    /// Retryable: the slot's decision scope stayed contended past the
    /// bounded wait.
    #[error(transparent)]
    LockTimeout(#[from] LockTimeout),
}

impl From<StoreError> for AdmissionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SlotNotFound(id) => Self::SlotNotFound(id),
            StoreError::TokenNotFound(id) => Self::TokenNotFound(id),
        }
    }
}

impl AdmissionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout(_))
    }
}

/// Decides one token's fate per call and fills vacancies as seats free up.
pub struct AdmissionEngine {
    store: Arc<dyn TokenStore>,
    locks: SlotLocks,
    events: EventLog,
}

impl AdmissionEngine {
    pub fn new(store: Arc<dyn TokenStore>, events: EventLog, lock_timeout: Duration) -> Self {
        Self {
            store,
            locks: SlotLocks::new(lock_timeout),
            events,
        }
    }

    /// Admit a freshly created token: confirm, displace-and-confirm, or
    /// waitlist. The token must carry its computed priority score.
    pub async fn admit(&self, token: Token) -> Result<Decision, AdmissionError> {
        let slot_id = token.slot_id;
        let guard = self.locks.acquire(slot_id).await?;

        let slot = self.store.slot(slot_id)?;
        let token_id = token.id;
        let score = token.priority_score;
        self.store.insert_token(token);

        let confirmed = self.store.confirmed_count(slot_id);
        let capacity = slot.hard_capacity as usize;

        if confirmed < capacity {
            let seat = self.confirm(token_id, slot_id, EventType::TokenConfirmed)?;
            drop(guard);
            tracing::info!(token = %token_id, slot = %slot_id, seat, "Token confirmed");
            return Ok(Decision::Confirmed { seat_number: seat });
        }

        // Slot full: displace only if strictly higher priority than the
        // weakest confirmed holder. Ties retain the incumbent.
        if let Some(incumbent) = self.store.lowest_priority_confirmed(slot_id)
            && score > incumbent.priority_score
        {
            self.store
                .update_token(incumbent.id, TokenStatus::Waitlisted, None)?;
            self.events.record(
                Event::new(
                    EntityType::Token,
                    incumbent.id.to_string(),
                    EventType::TokenDisplaced,
                )
                .with_payload(serde_json::json!({
                    "displaced_by": token_id,
                    "slot_id": slot_id,
                })),
            );

            // Vacated seat, recomputed rather than inherited, so seat
            // numbers stay injective across displacement cycles.
            let seat = self.confirm(token_id, slot_id, EventType::TokenConfirmed)?;
            drop(guard);
            tracing::info!(
                token = %token_id,
                displaced = %incumbent.id,
                slot = %slot_id,
                seat,
                "Token confirmed by displacement"
            );
            return Ok(Decision::Confirmed { seat_number: seat });
        }

        self.store
            .update_token(token_id, TokenStatus::Waitlisted, None)?;
        self.events.record(Event::new(
            EntityType::Token,
            token_id.to_string(),
            EventType::TokenWaitlisted,
        ));
        drop(guard);
        tracing::info!(token = %token_id, slot = %slot_id, score, "Token waitlisted");
        Ok(Decision::Waitlisted)
    }

    /// Cancel a token. Idempotent: an already-terminal token is left alone
    /// and triggers no promotion.
    pub async fn cancel(
        &self,
        token_id: TokenId,
        actor_id: Option<&str>,
    ) -> Result<Token, AdmissionError> {
        self.close_out(token_id, TokenStatus::Cancelled, actor_id)
            .await
    }

    /// Mark a confirmed token as a no-show. Identical to cancellation in
    /// effect on capacity and promotion; distinct terminal status for audit.
    pub async fn mark_no_show(
        &self,
        token_id: TokenId,
        actor_id: Option<&str>,
    ) -> Result<Token, AdmissionError> {
        self.close_out(token_id, TokenStatus::NoShow, actor_id).await
    }

    async fn close_out(
        &self,
        token_id: TokenId,
        terminal: TokenStatus,
        actor_id: Option<&str>,
    ) -> Result<Token, AdmissionError> {
        let slot_id = self.store.token(token_id)?.slot_id;
        let guard = self.locks.acquire(slot_id).await?;

        // Re-read under the lock; the pre-lock read only located the slot.
        let token = self.store.token(token_id)?;
        if token.is_terminal() {
            return Ok(token);
        }

        if terminal == TokenStatus::NoShow && token.status != TokenStatus::Confirmed {
            return Err(AdmissionError::InvalidState {
                token: token_id,
                status: token.status.as_str(),
                reason: "no-show requires a held seat",
            });
        }

        let freed_seat = token.is_confirmed();
        self.store.update_token(token_id, terminal, None)?;

        let event_type = match terminal {
            TokenStatus::NoShow => EventType::TokenNoShow,
            _ => EventType::TokenCancelled,
        };
        let mut event = Event::new(EntityType::Token, token_id.to_string(), event_type);
        if let Some(actor) = actor_id {
            event = event.with_actor(actor);
        }
        self.events.record(event);
        tracing::info!(token = %token_id, slot = %slot_id, status = terminal.as_str(), "Token closed out");

        // One seat freed, one promotion pass, same lock scope.
        if freed_seat {
            self.promote_locked(slot_id, &guard)?;
        }

        Ok(self.store.token(token_id)?)
    }

    /// Promote the best-ranked waitlisted token into a vacancy, if any.
    /// Considers a single vacancy per invocation.
    pub async fn promote(&self, slot_id: SlotId) -> Result<Option<Token>, AdmissionError> {
        let guard = self.locks.acquire(slot_id).await?;
        self.promote_locked(slot_id, &guard)
    }

    /// Promote until the slot is full or the waitlist is empty. For callers
    /// that free multiple seats in one logical operation.
    pub async fn fill_vacancies(&self, slot_id: SlotId) -> Result<Vec<Token>, AdmissionError> {
        let guard = self.locks.acquire(slot_id).await?;
        let mut promoted = Vec::new();
        while let Some(token) = self.promote_locked(slot_id, &guard)? {
            promoted.push(token);
        }
        Ok(promoted)
    }

    /// Single promotion pass. The guard parameter makes holding the slot
    /// lock a compile-time obligation of the caller.
    fn promote_locked(
        &self,
        slot_id: SlotId,
        _guard: &OwnedMutexGuard<()>,
    ) -> Result<Option<Token>, AdmissionError> {
        let slot = self.store.slot(slot_id)?;
        let confirmed = self.store.confirmed_count(slot_id);
        if confirmed >= slot.hard_capacity as usize {
            return Ok(None);
        }

        let Some(next) = self.store.waitlisted(slot_id).into_iter().next() else {
            return Ok(None);
        };

        let seat = self.confirm(next.id, slot_id, EventType::TokenPromoted)?;
        tracing::info!(token = %next.id, slot = %slot_id, seat, "Token promoted from waitlist");
        Ok(Some(self.store.token(next.id)?))
    }

    /// Confirm a token into the lowest free seat. Caller holds the slot lock.
    fn confirm(
        &self,
        token_id: TokenId,
        slot_id: SlotId,
        event_type: EventType,
    ) -> Result<u32, AdmissionError> {
        let seat = self.store.lowest_free_seat(slot_id);
        self.store
            .update_token(token_id, TokenStatus::Confirmed, Some(seat))?;
        self.events.record(
            Event::new(EntityType::Token, token_id.to_string(), event_type)
                .with_payload(serde_json::json!({ "seat_number": seat })),
        );
        Ok(seat)
    }
}
