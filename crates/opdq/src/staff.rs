//! Doctor and employee records.
//!
//! Plain data-entry registry; slot creation validates doctor existence here.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Unique identifier for a doctor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoctorId(uuid::Uuid);

impl DoctorId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        let uuid = uuid::Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }
}

impl Default for DoctorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DoctorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(uuid::Uuid);

impl EmployeeId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for EmployeeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Doctor {
    pub id: DoctorId,
    pub name: String,
    pub specialization: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub department: Option<String>,
    pub designation: Option<String>,
}

/// In-memory staff registry.
#[derive(Default)]
pub struct StaffRegistry {
    doctors: DashMap<DoctorId, Doctor>,
    employees: DashMap<EmployeeId, Employee>,
}

impl StaffRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_doctor(&self, name: String, specialization: Option<String>) -> Doctor {
        let doctor = Doctor {
            id: DoctorId::new(),
            name,
            specialization,
        };
        self.doctors.insert(doctor.id, doctor.clone());
        doctor
    }

    pub fn create_employee(
        &self,
        name: String,
        department: Option<String>,
        designation: Option<String>,
    ) -> Employee {
        let employee = Employee {
            id: EmployeeId::new(),
            name,
            department,
            designation,
        };
        self.employees.insert(employee.id, employee.clone());
        employee
    }

    pub fn doctor(&self, id: DoctorId) -> Option<Doctor> {
        self.doctors.get(&id).map(|d| d.clone())
    }

    pub fn doctor_exists(&self, id: DoctorId) -> bool {
        self.doctors.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_doctor_and_lookup() {
        let registry = StaffRegistry::new();
        let doctor = registry.create_doctor("Dr. Iyer".to_string(), Some("ENT".to_string()));

        assert!(registry.doctor_exists(doctor.id));
        assert_eq!(registry.doctor(doctor.id).unwrap().name, "Dr. Iyer");
        assert!(!registry.doctor_exists(DoctorId::new()));
    }

    #[test]
    fn create_employee() {
        let registry = StaffRegistry::new();
        let employee = registry.create_employee(
            "R. Menon".to_string(),
            Some("Front Desk".to_string()),
            None,
        );
        assert_eq!(employee.department.as_deref(), Some("Front Desk"));
    }
}
