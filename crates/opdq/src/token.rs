//! Token lifecycle state.
//!
//! A token is a single admission request against a slot. It is created in
//! `Requested` state, moves exactly once per admission decision into
//! `Confirmed` or `Waitlisted`, and may later be displaced, promoted, or
//! closed out as `Cancelled`/`NoShow`. Terminal states never transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::patient::PatientId;
use crate::slot::SlotId;
use crate::staff::DoctorId;

/// Unique identifier for a token.
///
/// UUID v4 avoids confusion with seat numbers and prevents accidental reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(uuid::Uuid);

impl TokenId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        let uuid = uuid::Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Originating channel of a token request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenSource {
    Online,
    WalkIn,
    FollowUp,
    Emergency,
}

impl TokenSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::WalkIn => "WALK_IN",
            Self::FollowUp => "FOLLOW_UP",
            Self::Emergency => "EMERGENCY",
        }
    }
}

/// Payment state attached to a token request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    Waived,
}

/// Lifecycle status of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenStatus {
    /// Created, admission decision pending.
    Requested,
    /// Holds a seat in the slot.
    Confirmed,
    /// Waiting for a vacancy.
    Waitlisted,
    /// Cancelled by the patient or staff.
    Cancelled,
    /// Confirmed but did not show up.
    NoShow,
}

impl TokenStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::NoShow)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::Confirmed => "CONFIRMED",
            Self::Waitlisted => "WAITLISTED",
            Self::Cancelled => "CANCELLED",
            Self::NoShow => "NO_SHOW",
        }
    }
}

/// A single admission request against a slot.
///
/// Seat number is `Some` iff status is `Confirmed`; the engine is the only
/// writer of `status` and `seat_number` after creation.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    pub id: TokenId,
    pub patient_id: PatientId,
    pub doctor_id: DoctorId,
    pub slot_id: SlotId,
    pub source: TokenSource,
    pub payment_status: PaymentStatus,
    pub is_emergency: bool,
    pub priority_score: i32,
    pub status: TokenStatus,
    pub seat_number: Option<u32>,
    pub created_at: DateTime<Utc>,
    /// Actor that submitted the request (employee, doctor, or system id).
    pub created_by: String,
}

impl Token {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        patient_id: PatientId,
        doctor_id: DoctorId,
        slot_id: SlotId,
        source: TokenSource,
        payment_status: PaymentStatus,
        is_emergency: bool,
        priority_score: i32,
        created_by: String,
    ) -> Self {
        Self {
            id: TokenId::new(),
            patient_id,
            doctor_id,
            slot_id,
            source,
            payment_status,
            is_emergency,
            priority_score,
            status: TokenStatus::Requested,
            seat_number: None,
            created_at: Utc::now(),
            created_by,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == TokenStatus::Confirmed
    }
}
