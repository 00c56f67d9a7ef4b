//! Slot entity: a bounded resource window with a hard seat capacity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::staff::DoctorId;

/// Unique identifier for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(uuid::Uuid);

impl SlotId {
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

impl Default for SlotId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An OPD slot. Capacity is immutable after creation; resizing is out of scope.
#[derive(Debug, Clone, Serialize)]
pub struct Slot {
    pub id: SlotId,
    pub doctor_id: DoctorId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Maximum number of concurrently confirmed tokens. Always positive.
    pub hard_capacity: u32,
}

impl Slot {
    pub fn new(
        doctor_id: DoctorId,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        hard_capacity: u32,
    ) -> Self {
        Self {
            id: SlotId::new(),
            doctor_id,
            starts_at,
            ends_at,
            hard_capacity,
        }
    }
}
