//! Clinic data access.
//!
//! [`ClinicStore`] is the seam between HTTP handlers and persistence. Every
//! operation is scoped to a physician id so one physician never reads or
//! mutates another physician's rows. Two backends exist:
//!
//! - [`PgStore`]: PostgreSQL through the shared `sqlx` pool
//! - [`MemoryStore`]: process-local tables for development and tests
//!
//! Failures are reported as [`StoreError`]; callers distinguish an
//! unreachable database from a missing row by variant, not by message.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;

use crate::models::{
    Appointment, NewAppointment, NewPatient, NewPhysician, Patient, PatientSummary, Physician,
    PhysicianIdentity,
};

/// Message for a patient that is missing or owned by another physician.
pub const PATIENT_NOT_FOUND: &str = "Paciente no encontrado";

/// Message for an exact duplicate appointment.
pub const DUPLICATE_APPOINTMENT: &str = "Ya existe una cita con esos datos.";

/// Message for a registration with an email already in use.
pub const DUPLICATE_EMAIL: &str = "Este email ya está registrado";

/// Data-layer failure taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The database could not be reached or no connection was available.
    #[error("{0}")]
    Connection(String),

    /// The requested row does not exist for this physician.
    #[error("{0}")]
    NotFound(String),

    /// The row would violate a uniqueness rule.
    #[error("{0}")]
    Duplicate(String),

    /// Any other statement failure.
    #[error("{0}")]
    Query(String),
}

impl StoreError {
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => Self::Connection(err.to_string()),
            sqlx::Error::RowNotFound => Self::NotFound(err.to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Self::Duplicate(db.message().to_string())
            }
            other => Self::Query(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations used by the web layer.
#[async_trait]
pub trait ClinicStore: Send + Sync {
    /// Insert a physician. Fails with [`StoreError::Duplicate`] when the
    /// email is already registered.
    async fn register_physician(&self, physician: NewPhysician) -> StoreResult<Physician>;

    /// Match an `(email, digest)` pair.
    async fn authenticate(
        &self,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<Option<PhysicianIdentity>>;

    async fn find_physician(&self, physician_id: i32) -> StoreResult<Option<PhysicianIdentity>>;

    /// Appointments ordered by date, then time, ascending.
    async fn list_appointments(&self, physician_id: i32) -> StoreResult<Vec<Appointment>>;

    /// Patients ordered by name.
    async fn list_patients(&self, physician_id: i32) -> StoreResult<Vec<Patient>>;

    /// A single patient; [`StoreError::NotFound`] when absent or not owned.
    async fn find_patient(&self, physician_id: i32, patient_id: i32) -> StoreResult<Patient>;

    /// Patients with appointment counts, optionally narrowed to one id.
    async fn patient_summaries(
        &self,
        physician_id: i32,
        patient_id: Option<i32>,
    ) -> StoreResult<Vec<PatientSummary>>;

    /// A patient and its appointments, newest first.
    async fn patient_history(
        &self,
        physician_id: i32,
        patient_id: i32,
    ) -> StoreResult<(Patient, Vec<Appointment>)>;

    async fn create_patient(&self, physician_id: i32, patient: NewPatient) -> StoreResult<Patient>;

    /// Schedule an appointment for one of the physician's patients.
    ///
    /// The duplicate check and the insert are a single atomic step.
    async fn create_appointment(
        &self,
        physician_id: i32,
        patient_id: i32,
        appointment: NewAppointment,
    ) -> StoreResult<Appointment>;

    /// Flag an appointment as cancelled. Returns the number of rows changed,
    /// which is zero for another physician's appointment.
    async fn cancel_appointment(&self, physician_id: i32, appointment_id: i32) -> StoreResult<u64>;

    async fn appointment_count(&self, physician_id: i32, patient_id: i32) -> StoreResult<i64>;

    /// Delete a patient and its appointments. Returns the patient's name.
    async fn delete_patient(&self, physician_id: i32, patient_id: i32) -> StoreResult<String>;

    /// Confirm the backend is reachable.
    async fn ping(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_a_connection_error() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_connection());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn test_other_errors_map_to_query() {
        let err = StoreError::from(sqlx::Error::ColumnNotFound("edad".into()));
        assert!(matches!(err, StoreError::Query(ref msg) if msg.contains("edad")));
    }
}
