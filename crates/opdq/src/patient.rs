//! Patient directory collaborator.
//!
//! The engine treats patients as opaque references; resolution by phone (or
//! fresh creation) happens once per admission request, before scoring.

use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Unique identifier for a patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(uuid::Uuid);

impl PatientId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for PatientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PatientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Patient {
    pub id: PatientId,
    pub name: String,
    pub phone: Option<String>,
    pub dob: Option<NaiveDate>,
}

/// Input for creating a fresh patient record.
#[derive(Debug, Clone, Deserialize)]
pub struct PatientData {
    pub name: String,
    pub phone: Option<String>,
    pub dob: Option<NaiveDate>,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("patient directory unavailable: {0}")]
    Unavailable(String),
}

/// Lookup/creation contract for patient records.
///
/// Failures propagate as admission failures; the engine never retries.
pub trait PatientDirectory: Send + Sync {
    fn find_by_phone(&self, phone: &str) -> Result<Option<Patient>, DirectoryError>;
    fn create(&self, data: PatientData) -> Result<Patient, DirectoryError>;

    /// Resolve a patient by phone, creating a record if none matches.
    fn resolve(&self, data: PatientData) -> Result<Patient, DirectoryError> {
        if let Some(ref phone) = data.phone
            && let Some(existing) = self.find_by_phone(phone)?
        {
            return Ok(existing);
        }
        self.create(data)
    }
}

/// In-memory patient directory with lock-free concurrent access.
#[derive(Default)]
pub struct MemoryPatientDirectory {
    patients: DashMap<PatientId, Patient>,
}

impl MemoryPatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PatientId) -> Option<Patient> {
        self.patients.get(&id).map(|p| p.clone())
    }
}

impl PatientDirectory for MemoryPatientDirectory {
    fn find_by_phone(&self, phone: &str) -> Result<Option<Patient>, DirectoryError> {
        Ok(self
            .patients
            .iter()
            .find(|p| p.phone.as_deref() == Some(phone))
            .map(|p| p.clone()))
    }

    fn create(&self, data: PatientData) -> Result<Patient, DirectoryError> {
        let patient = Patient {
            id: PatientId::new(),
            name: data.name,
            phone: data.phone,
            dob: data.dob,
        };
        self.patients.insert(patient.id, patient.clone());
        Ok(patient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_find_by_phone() {
        let dir = MemoryPatientDirectory::new();
        let created = dir
            .create(PatientData {
                name: "Asha Rao".to_string(),
                phone: Some("9876500001".to_string()),
                dob: None,
            })
            .unwrap();

        let found = dir.find_by_phone("9876500001").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(dir.find_by_phone("0000000000").unwrap().is_none());
    }

    #[test]
    fn resolve_reuses_existing_record() {
        let dir = MemoryPatientDirectory::new();
        let first = dir
            .resolve(PatientData {
                name: "Asha Rao".to_string(),
                phone: Some("9876500001".to_string()),
                dob: None,
            })
            .unwrap();
        let second = dir
            .resolve(PatientData {
                name: "A. Rao".to_string(),
                phone: Some("9876500001".to_string()),
                dob: None,
            })
            .unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn resolve_without_phone_creates_fresh() {
        let dir = MemoryPatientDirectory::new();
        let a = dir
            .resolve(PatientData {
                name: "Walk In".to_string(),
                phone: None,
                dob: None,
            })
            .unwrap();
        let b = dir
            .resolve(PatientData {
                name: "Walk In".to_string(),
                phone: None,
                dob: None,
            })
            .unwrap();
        assert_ne!(a.id, b.id);
    }
}
