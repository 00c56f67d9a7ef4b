//! opdq: priority-based token allocation engine for outpatient slots.

mod locks;
mod priority;
mod slot;
mod staff;
mod token;

pub mod engine;
pub mod events;
pub mod patient;
pub mod service;
pub mod store;
pub mod transport;

pub use engine::{AdmissionEngine, AdmissionError, Decision};
pub use events::{EntityType, Event, EventLog, EventSink, EventType, MemoryEventSink};
pub use locks::{DEFAULT_LOCK_TIMEOUT, LockTimeout, SlotLocks};
pub use patient::{MemoryPatientDirectory, Patient, PatientData, PatientDirectory, PatientId};
pub use priority::score;
pub use service::{ServiceError, TokenRequest, TokenService, TokenTicket};
pub use slot::{Slot, SlotId};
pub use staff::{Doctor, DoctorId, Employee, EmployeeId, StaffRegistry};
pub use store::{MemoryStore, StoreError, TokenStore};
pub use token::{PaymentStatus, Token, TokenId, TokenSource, TokenStatus};
