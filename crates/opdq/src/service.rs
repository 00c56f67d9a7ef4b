//! TokenService: transport-agnostic token lifecycle management.
//!
//! This service owns:
//! - Patient resolution (by phone, or fresh creation)
//! - Priority scoring and token creation
//! - Delegation to the admission/promotion engine
//! - Audit event emission
//! - Slot and staff data entry
//! - Shutdown coordination
//!
//! Transports (HTTP today) delegate here and stay thin.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tokio::sync::watch;

use crate::engine::{AdmissionEngine, AdmissionError, Decision};
use crate::events::{EntityType, Event, EventLog, EventSink, EventType, MemoryEventSink};
use crate::locks::DEFAULT_LOCK_TIMEOUT;
use crate::patient::{DirectoryError, MemoryPatientDirectory, PatientData, PatientDirectory};
use crate::slot::{Slot, SlotId};
use crate::staff::{Doctor, DoctorId, Employee, StaffRegistry};
use crate::store::{MemoryStore, StoreError, TokenStore};
use crate::token::{PaymentStatus, Token, TokenId, TokenSource};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("slot {0} not found")]
    SlotNotFound(SlotId),
    #[error("token {0} not found")]
    TokenNotFound(TokenId),
    #[error("doctor {0} not found")]
    DoctorNotFound(DoctorId),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Retryable by the caller.
    #[error("{0}")]
    Contention(String),
    #[error("dependency failure: {0}")]
    Dependency(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SlotNotFound(id) => Self::SlotNotFound(id),
            StoreError::TokenNotFound(id) => Self::TokenNotFound(id),
        }
    }
}

impl From<AdmissionError> for ServiceError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::SlotNotFound(id) => Self::SlotNotFound(id),
            AdmissionError::TokenNotFound(id) => Self::TokenNotFound(id),
            AdmissionError::InvalidState { .. } => Self::InvalidState(err.to_string()),
            AdmissionError::LockTimeout(_) => Self::Contention(err.to_string()),
        }
    }
}

impl From<DirectoryError> for ServiceError {
    fn from(err: DirectoryError) -> Self {
        Self::Dependency(err.to_string())
    }
}

/// Inbound token request, as shaped by the API layer.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub name: String,
    pub phone: Option<String>,
    pub dob: Option<NaiveDate>,
    pub doctor_id: DoctorId,
    pub slot_id: SlotId,
    pub source: TokenSource,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub is_emergency: bool,
    /// Requester identity for audit (employee, doctor, or system id).
    pub requested_by: String,
}

/// A token together with the decision that admitted it.
#[derive(Debug, Clone)]
pub struct TokenTicket {
    pub token: Token,
    pub decision: Decision,
}

pub struct TokenService {
    store: Arc<dyn TokenStore>,
    patients: Arc<dyn PatientDirectory>,
    staff: Arc<StaffRegistry>,
    engine: AdmissionEngine,
    events: EventLog,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TokenService {
    /// In-memory service with the default lock timeout.
    pub fn new() -> Self {
        Self::with_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryPatientDirectory::new()),
            Arc::new(MemoryEventSink::new()),
            DEFAULT_LOCK_TIMEOUT,
        )
    }

    pub fn with_parts(
        store: Arc<dyn TokenStore>,
        patients: Arc<dyn PatientDirectory>,
        sink: Arc<dyn EventSink>,
        lock_timeout: Duration,
    ) -> Self {
        let events = EventLog::new(sink);
        let engine = AdmissionEngine::new(Arc::clone(&store), events.clone(), lock_timeout);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            store,
            patients,
            staff: Arc::new(StaffRegistry::new()),
            engine,
            events,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Request a token: resolve the patient, score the request, create the
    /// token, and run it through the admission engine.
    pub async fn request_token(&self, request: TokenRequest) -> Result<TokenTicket, ServiceError> {
        // Slot existence is checked up front so a bad request fails before
        // we create a patient record.
        let slot = self.store.slot(request.slot_id)?;
        if slot.doctor_id != request.doctor_id {
            return Err(ServiceError::InvalidRequest(
                "slot does not belong to the requested doctor".to_string(),
            ));
        }

        let patient = self.patients.resolve(PatientData {
            name: request.name,
            phone: request.phone,
            dob: request.dob,
        })?;

        let priority_score =
            crate::priority::score(request.source, request.payment_status, request.is_emergency);

        let token = Token::new(
            patient.id,
            request.doctor_id,
            request.slot_id,
            request.source,
            request.payment_status,
            request.is_emergency,
            priority_score,
            request.requested_by.clone(),
        );
        let token_id = token.id;

        self.events.record(
            Event::new(EntityType::Token, token_id.to_string(), EventType::TokenRequested)
                .with_payload(serde_json::json!({ "source": request.source }))
                .with_actor(request.requested_by),
        );

        let decision = self.engine.admit(token).await?;
        let token = self.store.token(token_id)?;
        Ok(TokenTicket { token, decision })
    }

    pub async fn cancel_token(
        &self,
        token_id: TokenId,
        actor_id: Option<&str>,
    ) -> Result<Token, ServiceError> {
        Ok(self.engine.cancel(token_id, actor_id).await?)
    }

    pub async fn mark_no_show(
        &self,
        token_id: TokenId,
        actor_id: Option<&str>,
    ) -> Result<Token, ServiceError> {
        Ok(self.engine.mark_no_show(token_id, actor_id).await?)
    }

    pub fn token(&self, id: TokenId) -> Result<Token, ServiceError> {
        Ok(self.store.token(id)?)
    }

    /// Fill every open seat in a slot from its waitlist.
    pub async fn fill_vacancies(&self, slot_id: SlotId) -> Result<Vec<Token>, ServiceError> {
        Ok(self.engine.fill_vacancies(slot_id).await?)
    }

    pub fn create_slot(
        &self,
        doctor_id: DoctorId,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        hard_capacity: u32,
    ) -> Result<Slot, ServiceError> {
        if !self.staff.doctor_exists(doctor_id) {
            return Err(ServiceError::DoctorNotFound(doctor_id));
        }
        if starts_at >= ends_at {
            return Err(ServiceError::InvalidRequest(
                "slot must start before it ends".to_string(),
            ));
        }
        if hard_capacity == 0 {
            return Err(ServiceError::InvalidRequest(
                "slot capacity must be positive".to_string(),
            ));
        }

        let slot = Slot::new(doctor_id, starts_at, ends_at, hard_capacity);
        self.store.insert_slot(slot.clone());
        self.events.record(
            Event::new(EntityType::Slot, slot.id.to_string(), EventType::SlotCreated)
                .with_payload(serde_json::json!({ "hard_capacity": hard_capacity })),
        );
        tracing::info!(slot = %slot.id, doctor = %doctor_id, hard_capacity, "Slot created");
        Ok(slot)
    }

    pub fn slot(&self, id: SlotId) -> Result<Slot, ServiceError> {
        Ok(self.store.slot(id)?)
    }

    pub fn slot_tokens(&self, id: SlotId) -> Result<Vec<Token>, ServiceError> {
        self.store.slot(id)?;
        Ok(self.store.tokens_for_slot(id))
    }

    pub fn confirmed_count(&self, id: SlotId) -> Result<usize, ServiceError> {
        self.store.slot(id)?;
        Ok(self.store.confirmed_count(id))
    }

    pub fn create_doctor(&self, name: String, specialization: Option<String>) -> Doctor {
        self.staff.create_doctor(name, specialization)
    }

    pub fn create_employee(
        &self,
        name: String,
        department: Option<String>,
        designation: Option<String>,
    ) -> Employee {
        self.staff.create_employee(name, department, designation)
    }

    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn service() -> TokenService {
        TokenService::new()
    }

    fn slot_for(service: &TokenService, capacity: u32) -> (DoctorId, SlotId) {
        let doctor = service.create_doctor("Dr. Iyer".to_string(), None);
        let start = Utc::now();
        let slot = service
            .create_slot(doctor.id, start, start + ChronoDuration::hours(2), capacity)
            .unwrap();
        (doctor.id, slot.id)
    }

    fn request(doctor_id: DoctorId, slot_id: SlotId, phone: &str) -> TokenRequest {
        TokenRequest {
            name: "Asha Rao".to_string(),
            phone: Some(phone.to_string()),
            dob: None,
            doctor_id,
            slot_id,
            source: TokenSource::Online,
            payment_status: PaymentStatus::Paid,
            is_emergency: false,
            requested_by: "emp-1".to_string(),
        }
    }

    #[tokio::test]
    async fn request_token_confirms_into_open_slot() {
        let svc = service();
        let (doctor_id, slot_id) = slot_for(&svc, 2);

        let ticket = svc
            .request_token(request(doctor_id, slot_id, "9876500001"))
            .await
            .unwrap();

        assert_eq!(ticket.decision, Decision::Confirmed { seat_number: 1 });
        assert_eq!(ticket.token.seat_number, Some(1));
        assert_eq!(ticket.token.priority_score, 350);
    }

    #[tokio::test]
    async fn repeat_phone_reuses_patient() {
        let svc = service();
        let (doctor_id, slot_id) = slot_for(&svc, 3);

        let first = svc
            .request_token(request(doctor_id, slot_id, "9876500001"))
            .await
            .unwrap();
        let second = svc
            .request_token(request(doctor_id, slot_id, "9876500001"))
            .await
            .unwrap();

        assert_eq!(first.token.patient_id, second.token.patient_id);
    }

    #[tokio::test]
    async fn request_against_unknown_slot_fails_before_patient_creation() {
        let svc = service();
        let doctor = svc.create_doctor("Dr. Iyer".to_string(), None);

        let err = svc
            .request_token(request(doctor.id, SlotId::new(), "9876500001"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::SlotNotFound(_)));
    }

    #[tokio::test]
    async fn store_lookups_map_to_not_found_errors() {
        let svc = service();

        let err = svc.token(TokenId::new()).unwrap_err();
        assert!(matches!(err, ServiceError::TokenNotFound(_)));

        let err = svc.slot(SlotId::new()).unwrap_err();
        assert!(matches!(err, ServiceError::SlotNotFound(_)));

        let err = svc.confirmed_count(SlotId::new()).unwrap_err();
        assert!(matches!(err, ServiceError::SlotNotFound(_)));
    }

    #[tokio::test]
    async fn request_rejects_mismatched_doctor() {
        let svc = service();
        let (_doctor, slot_id) = slot_for(&svc, 1);
        let other = svc.create_doctor("Dr. Other".to_string(), None);

        let err = svc
            .request_token(request(other.id, slot_id, "9876500001"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn create_slot_validates_doctor_window_and_capacity() {
        let svc = service();
        let start = Utc::now();
        let end = start + ChronoDuration::hours(1);

        let err = svc
            .create_slot(DoctorId::new(), start, end, 3)
            .unwrap_err();
        assert!(matches!(err, ServiceError::DoctorNotFound(_)));

        let doctor = svc.create_doctor("Dr. Iyer".to_string(), None);
        let err = svc.create_slot(doctor.id, end, start, 3).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));

        let err = svc.create_slot(doctor.id, start, end, 0).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn cancel_flows_through_to_engine() {
        let svc = service();
        let (doctor_id, slot_id) = slot_for(&svc, 1);

        let ticket = svc
            .request_token(request(doctor_id, slot_id, "9876500001"))
            .await
            .unwrap();
        let cancelled = svc
            .cancel_token(ticket.token.id, Some("emp-1"))
            .await
            .unwrap();

        assert!(cancelled.is_terminal());
        assert_eq!(svc.confirmed_count(slot_id).unwrap(), 0);
    }

    #[tokio::test]
    async fn slot_tokens_lists_confirmed_first() {
        let svc = service();
        let (doctor_id, slot_id) = slot_for(&svc, 1);

        svc.request_token(request(doctor_id, slot_id, "9876500001"))
            .await
            .unwrap();
        let mut waitlisted_req = request(doctor_id, slot_id, "9876500002");
        waitlisted_req.payment_status = PaymentStatus::Unpaid;
        svc.request_token(waitlisted_req).await.unwrap();

        let tokens = svc.slot_tokens(slot_id).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].seat_number, Some(1));
        assert!(tokens[1].seat_number.is_none());
    }

    #[tokio::test]
    async fn shutdown_signal_works() {
        let svc = service();
        let mut rx = svc.shutdown_rx();
        assert!(!*rx.borrow());

        svc.trigger_shutdown();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }
}
