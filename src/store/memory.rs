//! In-process backend.
//!
//! Mirrors the PostgreSQL semantics: per-physician scoping, cascading patient
//! deletion, unique physician emails and unique appointments. All mutations
//! of one operation run under a single write lock, so check-then-insert
//! sequences are atomic.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use parking_lot::RwLock;

use super::{
    ClinicStore, StoreError, StoreResult, DUPLICATE_APPOINTMENT, DUPLICATE_EMAIL,
    PATIENT_NOT_FOUND,
};
use crate::crypto::constant_time_str_eq;
use crate::models::{
    Appointment, NewAppointment, NewPatient, NewPhysician, Patient, PatientSummary, Physician,
    PhysicianIdentity,
};

struct PhysicianRow {
    physician: Physician,
    password_hash: String,
}

struct PatientRow {
    medico_id: i32,
    patient: Patient,
}

#[derive(Default)]
struct Tables {
    last_physician_id: i32,
    last_patient_id: i32,
    last_appointment_id: i32,
    physicians: BTreeMap<i32, PhysicianRow>,
    patients: BTreeMap<i32, PatientRow>,
    appointments: BTreeMap<i32, Appointment>,
}

impl Tables {
    fn owned_patient(&self, physician_id: i32, patient_id: i32) -> StoreResult<&Patient> {
        self.patients
            .get(&patient_id)
            .filter(|row| row.medico_id == physician_id)
            .map(|row| &row.patient)
            .ok_or_else(|| StoreError::NotFound(PATIENT_NOT_FOUND.into()))
    }

    fn appointments_of(&self, physician_id: i32, patient_id: i32) -> impl Iterator<Item = &Appointment> {
        self.appointments
            .values()
            .filter(move |c| c.medico_id == physician_id && c.paciente_id == patient_id)
    }
}

/// [`ClinicStore`] kept in process memory.
///
/// Cloning shares the same tables.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    available: Arc<AtomicBool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Connection("connection refused".into()))
        }
    }

    /// Simulate the backend going down or coming back.
    #[cfg(test)]
    pub(crate) fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Remove a physician and everything it owns, as an external deletion would.
    #[cfg(test)]
    pub(crate) fn remove_physician(&self, physician_id: i32) {
        let mut tables = self.tables.write();
        tables.physicians.remove(&physician_id);
        tables.patients.retain(|_, row| row.medico_id != physician_id);
        tables.appointments.retain(|_, c| c.medico_id != physician_id);
    }
}

#[async_trait]
impl ClinicStore for MemoryStore {
    async fn register_physician(&self, physician: NewPhysician) -> StoreResult<Physician> {
        self.check_available()?;
        let mut tables = self.tables.write();

        if tables
            .physicians
            .values()
            .any(|row| row.physician.email == physician.email)
        {
            return Err(StoreError::Duplicate(DUPLICATE_EMAIL.into()));
        }

        tables.last_physician_id += 1;
        let stored = Physician {
            id: tables.last_physician_id,
            nombre: physician.nombre,
            email: physician.email,
            especialidad: physician.especialidad,
            fecha_registro: Local::now().naive_local(),
        };

        tables.physicians.insert(
            stored.id,
            PhysicianRow {
                physician: stored.clone(),
                password_hash: physician.password_hash,
            },
        );

        Ok(stored)
    }

    async fn authenticate(
        &self,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<Option<PhysicianIdentity>> {
        self.check_available()?;
        let tables = self.tables.read();

        Ok(tables
            .physicians
            .values()
            .find(|row| {
                row.physician.email == email && constant_time_str_eq(&row.password_hash, password_hash)
            })
            .map(|row| PhysicianIdentity {
                id: row.physician.id,
                nombre: row.physician.nombre.clone(),
                email: row.physician.email.clone(),
            }))
    }

    async fn find_physician(&self, physician_id: i32) -> StoreResult<Option<PhysicianIdentity>> {
        self.check_available()?;
        let tables = self.tables.read();

        Ok(tables.physicians.get(&physician_id).map(|row| PhysicianIdentity {
            id: row.physician.id,
            nombre: row.physician.nombre.clone(),
            email: row.physician.email.clone(),
        }))
    }

    async fn list_appointments(&self, physician_id: i32) -> StoreResult<Vec<Appointment>> {
        self.check_available()?;
        let tables = self.tables.read();

        let mut citas: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|c| c.medico_id == physician_id)
            .cloned()
            .collect();
        citas.sort_by(|a, b| (a.fecha, a.hora, a.id).cmp(&(b.fecha, b.hora, b.id)));

        Ok(citas)
    }

    async fn list_patients(&self, physician_id: i32) -> StoreResult<Vec<Patient>> {
        self.check_available()?;
        let tables = self.tables.read();

        let mut pacientes: Vec<Patient> = tables
            .patients
            .values()
            .filter(|row| row.medico_id == physician_id)
            .map(|row| row.patient.clone())
            .collect();
        pacientes.sort_by(|a, b| a.nombre.cmp(&b.nombre));

        Ok(pacientes)
    }

    async fn find_patient(&self, physician_id: i32, patient_id: i32) -> StoreResult<Patient> {
        self.check_available()?;
        let tables = self.tables.read();

        tables.owned_patient(physician_id, patient_id).cloned()
    }

    async fn patient_summaries(
        &self,
        physician_id: i32,
        patient_id: Option<i32>,
    ) -> StoreResult<Vec<PatientSummary>> {
        self.check_available()?;
        let tables = self.tables.read();

        let mut summaries: Vec<PatientSummary> = tables
            .patients
            .values()
            .filter(|row| row.medico_id == physician_id)
            .filter(|row| patient_id.map_or(true, |id| row.patient.id == id))
            .map(|row| PatientSummary {
                patient: row.patient.clone(),
                citas_count: tables.appointments_of(physician_id, row.patient.id).count() as i64,
            })
            .collect();
        summaries.sort_by(|a, b| a.patient.nombre.cmp(&b.patient.nombre));

        Ok(summaries)
    }

    async fn patient_history(
        &self,
        physician_id: i32,
        patient_id: i32,
    ) -> StoreResult<(Patient, Vec<Appointment>)> {
        self.check_available()?;
        let tables = self.tables.read();

        let paciente = tables.owned_patient(physician_id, patient_id)?.clone();
        let mut citas: Vec<Appointment> = tables
            .appointments_of(physician_id, patient_id)
            .cloned()
            .collect();
        citas.sort_by(|a, b| (b.fecha, b.hora, b.id).cmp(&(a.fecha, a.hora, a.id)));

        Ok((paciente, citas))
    }

    async fn create_patient(&self, physician_id: i32, patient: NewPatient) -> StoreResult<Patient> {
        self.check_available()?;
        let mut tables = self.tables.write();

        if !tables.physicians.contains_key(&physician_id) {
            return Err(StoreError::Query(format!(
                "physician {} does not exist",
                physician_id
            )));
        }

        tables.last_patient_id += 1;
        let stored = Patient {
            id: tables.last_patient_id,
            nombre: patient.nombre,
            edad: Some(patient.edad),
            email: Some(patient.email),
            telefono: patient.telefono,
            historial: patient.historial,
            fecha_registro: Local::now().naive_local(),
        };

        tables.patients.insert(
            stored.id,
            PatientRow {
                medico_id: physician_id,
                patient: stored.clone(),
            },
        );

        Ok(stored)
    }

    async fn create_appointment(
        &self,
        physician_id: i32,
        patient_id: i32,
        appointment: NewAppointment,
    ) -> StoreResult<Appointment> {
        self.check_available()?;
        let mut tables = self.tables.write();

        tables.owned_patient(physician_id, patient_id)?;

        let duplicate = tables.appointments_of(physician_id, patient_id).any(|c| {
            c.fecha == appointment.fecha
                && c.hora == appointment.hora
                && c.motivo.as_deref() == Some(appointment.motivo.as_str())
        });
        if duplicate {
            return Err(StoreError::Duplicate(DUPLICATE_APPOINTMENT.into()));
        }

        tables.last_appointment_id += 1;
        let cita = Appointment {
            id: tables.last_appointment_id,
            paciente_id: patient_id,
            medico_id: physician_id,
            fecha: appointment.fecha,
            hora: appointment.hora,
            motivo: Some(appointment.motivo),
            cancelada: false,
        };
        tables.appointments.insert(cita.id, cita.clone());

        Ok(cita)
    }

    async fn cancel_appointment(&self, physician_id: i32, appointment_id: i32) -> StoreResult<u64> {
        self.check_available()?;
        let mut tables = self.tables.write();

        match tables.appointments.get_mut(&appointment_id) {
            Some(cita) if cita.medico_id == physician_id => {
                cita.cancelada = true;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn appointment_count(&self, physician_id: i32, patient_id: i32) -> StoreResult<i64> {
        self.check_available()?;
        let tables = self.tables.read();

        Ok(tables.appointments_of(physician_id, patient_id).count() as i64)
    }

    async fn delete_patient(&self, physician_id: i32, patient_id: i32) -> StoreResult<String> {
        self.check_available()?;
        let mut tables = self.tables.write();

        let nombre = tables.owned_patient(physician_id, patient_id)?.nombre.clone();
        tables.appointments.retain(|_, c| c.paciente_id != patient_id);
        tables.patients.remove(&patient_id);

        Ok(nombre)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash_password;
    use chrono::{NaiveDate, NaiveTime};

    async fn physician(store: &MemoryStore, email: &str) -> i32 {
        store
            .register_physician(NewPhysician {
                nombre: format!("Dr. {}", email),
                email: email.into(),
                password_hash: hash_password("password123"),
                especialidad: None,
            })
            .await
            .unwrap()
            .id
    }

    fn new_patient(nombre: &str) -> NewPatient {
        NewPatient {
            nombre: nombre.into(),
            edad: 40,
            email: format!("{}@correo.com", nombre.to_lowercase()),
            telefono: Some("600123123".into()),
            historial: Some("Alergia a penicilina".into()),
        }
    }

    fn cita(day: u32, hour: u32, motivo: &str) -> NewAppointment {
        NewAppointment {
            fecha: NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
            hora: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            motivo: motivo.into(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        physician(&store, "ana@hospital.com").await;

        let err = store
            .register_physician(NewPhysician {
                nombre: "Otra".into(),
                email: "ana@hospital.com".into(),
                password_hash: hash_password("otra"),
                especialidad: Some("Pediatría".into()),
            })
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::Duplicate(DUPLICATE_EMAIL.into()));
    }

    #[tokio::test]
    async fn test_authenticate_matches_email_and_digest() {
        let store = MemoryStore::new();
        let id = physician(&store, "carlos@hospital.com").await;

        let found = store
            .authenticate("carlos@hospital.com", &hash_password("password123"))
            .await
            .unwrap();
        assert_eq!(found.map(|p| p.id), Some(id));

        let wrong = store
            .authenticate("carlos@hospital.com", &hash_password("nope"))
            .await
            .unwrap();
        assert!(wrong.is_none());
    }

    #[tokio::test]
    async fn test_patient_round_trip() {
        let store = MemoryStore::new();
        let medico = physician(&store, "a@h.com").await;

        let created = store.create_patient(medico, new_patient("Lucia")).await.unwrap();
        let fetched = store.find_patient(medico, created.id).await.unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.nombre, "Lucia");
        assert_eq!(fetched.edad, Some(40));
        assert_eq!(fetched.email.as_deref(), Some("lucia@correo.com"));
        assert_eq!(fetched.telefono.as_deref(), Some("600123123"));
        assert_eq!(fetched.historial.as_deref(), Some("Alergia a penicilina"));
        assert!(fetched.id > 0);
    }

    #[tokio::test]
    async fn test_patients_are_scoped_and_sorted() {
        let store = MemoryStore::new();
        let a = physician(&store, "a@h.com").await;
        let b = physician(&store, "b@h.com").await;

        store.create_patient(a, new_patient("Zoe")).await.unwrap();
        store.create_patient(a, new_patient("Ana")).await.unwrap();
        let foreign = store.create_patient(b, new_patient("Bruno")).await.unwrap();

        let names: Vec<String> = store
            .list_patients(a)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.nombre)
            .collect();
        assert_eq!(names, vec!["Ana", "Zoe"]);

        let err = store.find_patient(a, foreign.id).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound(PATIENT_NOT_FOUND.into()));
    }

    #[tokio::test]
    async fn test_appointments_sorted_by_date_then_time() {
        let store = MemoryStore::new();
        let medico = physician(&store, "a@h.com").await;
        let paciente = store.create_patient(medico, new_patient("Ana")).await.unwrap();

        store.create_appointment(medico, paciente.id, cita(12, 9, "c")).await.unwrap();
        store.create_appointment(medico, paciente.id, cita(10, 16, "b")).await.unwrap();
        store.create_appointment(medico, paciente.id, cita(10, 8, "a")).await.unwrap();

        let motivos: Vec<String> = store
            .list_appointments(medico)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|c| c.motivo)
            .collect();
        assert_eq!(motivos, vec!["a", "b", "c"]);

        let (_, history) = store.patient_history(medico, paciente.id).await.unwrap();
        let newest_first: Vec<String> = history.into_iter().filter_map(|c| c.motivo).collect();
        assert_eq!(newest_first, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_duplicate_appointment_rejected() {
        let store = MemoryStore::new();
        let medico = physician(&store, "a@h.com").await;
        let paciente = store.create_patient(medico, new_patient("Ana")).await.unwrap();

        store.create_appointment(medico, paciente.id, cita(1, 9, "Control")).await.unwrap();
        let err = store
            .create_appointment(medico, paciente.id, cita(1, 9, "Control"))
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::Duplicate(DUPLICATE_APPOINTMENT.into()));
        assert_eq!(store.appointment_count(medico, paciente.id).await.unwrap(), 1);

        // Different reason on the same slot is allowed
        store.create_appointment(medico, paciente.id, cita(1, 9, "Analítica")).await.unwrap();
        assert_eq!(store.appointment_count(medico, paciente.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cannot_book_for_foreign_patient() {
        let store = MemoryStore::new();
        let a = physician(&store, "a@h.com").await;
        let b = physician(&store, "b@h.com").await;
        let foreign = store.create_patient(b, new_patient("Bruno")).await.unwrap();

        let err = store.create_appointment(a, foreign.id, cita(1, 9, "x")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cancel_is_scoped_to_owner() {
        let store = MemoryStore::new();
        let a = physician(&store, "a@h.com").await;
        let b = physician(&store, "b@h.com").await;
        let paciente = store.create_patient(b, new_patient("Bruno")).await.unwrap();
        let appointment = store.create_appointment(b, paciente.id, cita(3, 10, "x")).await.unwrap();

        assert_eq!(store.cancel_appointment(a, appointment.id).await.unwrap(), 0);
        assert!(!store.list_appointments(b).await.unwrap()[0].cancelada);

        assert_eq!(store.cancel_appointment(b, appointment.id).await.unwrap(), 1);
        assert!(store.list_appointments(b).await.unwrap()[0].cancelada);
    }

    #[tokio::test]
    async fn test_summaries_count_and_filter() {
        let store = MemoryStore::new();
        let medico = physician(&store, "a@h.com").await;
        let ana = store.create_patient(medico, new_patient("Ana")).await.unwrap();
        let luis = store.create_patient(medico, new_patient("Luis")).await.unwrap();
        store.create_appointment(medico, ana.id, cita(1, 9, "x")).await.unwrap();
        store.create_appointment(medico, ana.id, cita(2, 9, "y")).await.unwrap();

        let all = store.patient_summaries(medico, None).await.unwrap();
        let counts: Vec<(String, i64)> = all
            .into_iter()
            .map(|s| (s.patient.nombre, s.citas_count))
            .collect();
        assert_eq!(counts, vec![("Ana".to_string(), 2), ("Luis".to_string(), 0)]);

        let only = store.patient_summaries(medico, Some(luis.id)).await.unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].patient.id, luis.id);
    }

    #[tokio::test]
    async fn test_delete_patient_cascades() {
        let store = MemoryStore::new();
        let medico = physician(&store, "a@h.com").await;
        let paciente = store.create_patient(medico, new_patient("Ana")).await.unwrap();
        store.create_appointment(medico, paciente.id, cita(1, 9, "x")).await.unwrap();

        let nombre = store.delete_patient(medico, paciente.id).await.unwrap();

        assert_eq!(nombre, "Ana");
        assert!(store.list_patients(medico).await.unwrap().is_empty());
        assert!(store.list_appointments(medico).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_reports_connection_error() {
        let store = MemoryStore::new();
        store.set_available(false);

        let err = store.list_appointments(1).await.unwrap_err();
        assert!(err.is_connection());
        assert!(store.ping().await.is_err());
    }
}
