//! Token/slot store: the persistence seam the engines decide against.
//!
//! Counts and orderings are always recomputed from the stored tokens, never
//! cached across calls. Correctness depends on the caller holding the slot's
//! lock across the read-decide-write sequence, not on these queries being
//! atomic on their own.

use dashmap::DashMap;

use crate::slot::{Slot, SlotId};
use crate::token::{Token, TokenId, TokenStatus};

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("slot {0} not found")]
    SlotNotFound(SlotId),
    #[error("token {0} not found")]
    TokenNotFound(TokenId),
}

/// Storage contract for tokens and slots.
///
/// Only the engine holding a slot's lock may call the mutating methods for
/// tokens of that slot.
pub trait TokenStore: Send + Sync {
    fn insert_slot(&self, slot: Slot);
    fn slot(&self, id: SlotId) -> Result<Slot, StoreError>;

    fn insert_token(&self, token: Token);
    fn token(&self, id: TokenId) -> Result<Token, StoreError>;

    /// Set a token's status and seat number in one write.
    fn update_token(
        &self,
        id: TokenId,
        status: TokenStatus,
        seat_number: Option<u32>,
    ) -> Result<(), StoreError>;

    /// Live count of confirmed tokens in a slot.
    fn confirmed_count(&self, slot_id: SlotId) -> usize;

    /// Confirmed token with the lowest priority score; among equal lowest
    /// scores, the most recently created (the newest is displaced first).
    fn lowest_priority_confirmed(&self, slot_id: SlotId) -> Option<Token>;

    /// Waitlisted tokens ordered by priority score descending, creation time
    /// ascending (FIFO among equals).
    fn waitlisted(&self, slot_id: SlotId) -> Vec<Token>;

    /// Smallest seat number >= 1 not held by a confirmed token in the slot.
    fn lowest_free_seat(&self, slot_id: SlotId) -> u32;

    /// All tokens of a slot, confirmed first by seat number, then the rest by
    /// creation time.
    fn tokens_for_slot(&self, slot_id: SlotId) -> Vec<Token>;
}

/// In-memory store with lock-free concurrent access.
#[derive(Default)]
pub struct MemoryStore {
    slots: DashMap<SlotId, Slot>,
    tokens: DashMap<TokenId, Token>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_tokens(&self, slot_id: SlotId) -> impl Iterator<Item = Token> + '_ {
        self.tokens
            .iter()
            .filter(move |t| t.slot_id == slot_id)
            .map(|t| t.clone())
    }
}

impl TokenStore for MemoryStore {
    fn insert_slot(&self, slot: Slot) {
        self.slots.insert(slot.id, slot);
    }

    fn slot(&self, id: SlotId) -> Result<Slot, StoreError> {
        self.slots
            .get(&id)
            .map(|s| s.clone())
            .ok_or(StoreError::SlotNotFound(id))
    }

    fn insert_token(&self, token: Token) {
        self.tokens.insert(token.id, token);
    }

    fn token(&self, id: TokenId) -> Result<Token, StoreError> {
        self.tokens
            .get(&id)
            .map(|t| t.clone())
            .ok_or(StoreError::TokenNotFound(id))
    }

    fn update_token(
        &self,
        id: TokenId,
        status: TokenStatus,
        seat_number: Option<u32>,
    ) -> Result<(), StoreError> {
        let mut token = self.tokens.get_mut(&id).ok_or(StoreError::TokenNotFound(id))?;
        token.status = status;
        token.seat_number = seat_number;
        Ok(())
    }

    fn confirmed_count(&self, slot_id: SlotId) -> usize {
        self.slot_tokens(slot_id)
            .filter(|t| t.status == TokenStatus::Confirmed)
            .count()
    }

    fn lowest_priority_confirmed(&self, slot_id: SlotId) -> Option<Token> {
        self.slot_tokens(slot_id)
            .filter(|t| t.status == TokenStatus::Confirmed)
            .min_by(|a, b| {
                a.priority_score
                    .cmp(&b.priority_score)
                    // Newest first among equal lowest scores.
                    .then(b.created_at.cmp(&a.created_at))
            })
    }

    fn waitlisted(&self, slot_id: SlotId) -> Vec<Token> {
        let mut tokens: Vec<Token> = self
            .slot_tokens(slot_id)
            .filter(|t| t.status == TokenStatus::Waitlisted)
            .collect();
        tokens.sort_by(|a, b| {
            b.priority_score
                .cmp(&a.priority_score)
                .then(a.created_at.cmp(&b.created_at))
        });
        tokens
    }

    fn lowest_free_seat(&self, slot_id: SlotId) -> u32 {
        let mut seats: Vec<u32> = self
            .slot_tokens(slot_id)
            .filter(|t| t.status == TokenStatus::Confirmed)
            .filter_map(|t| t.seat_number)
            .collect();
        seats.sort_unstable();

        let mut next = 1;
        for seat in seats {
            if seat == next {
                next += 1;
            } else if seat > next {
                break;
            }
        }
        next
    }

    fn tokens_for_slot(&self, slot_id: SlotId) -> Vec<Token> {
        let mut tokens: Vec<Token> = self.slot_tokens(slot_id).collect();
        tokens.sort_by(|a, b| match (a.seat_number, b.seat_number) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.created_at.cmp(&b.created_at),
        });
        tokens
    }
}
