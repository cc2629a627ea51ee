//! PostgreSQL backend.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::{
    ClinicStore, StoreError, StoreResult, DUPLICATE_APPOINTMENT, DUPLICATE_EMAIL,
    PATIENT_NOT_FOUND,
};
use crate::database::health_check;
use crate::models::{
    Appointment, NewAppointment, NewPatient, NewPhysician, Patient, PatientSummary, Physician,
    PhysicianIdentity,
};

const APPOINTMENT_COLUMNS: &str =
    "id, paciente_id, medico_id, fecha, hora, motivo, COALESCE(cancelada, FALSE) AS cancelada";

const PATIENT_COLUMNS: &str = "id, nombre, edad, email, telefono, historial, fecha_registro";

/// [`ClinicStore`] over a shared `sqlx` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClinicStore for PgStore {
    #[instrument(skip(self, physician), fields(email = %physician.email))]
    async fn register_physician(&self, physician: NewPhysician) -> StoreResult<Physician> {
        sqlx::query_as::<_, Physician>(
            r#"
            INSERT INTO medicos (nombre, email, password_hash, especialidad)
            VALUES ($1, $2, $3, $4)
            RETURNING id, nombre, email, especialidad, fecha_registro
            "#,
        )
        .bind(&physician.nombre)
        .bind(&physician.email)
        .bind(&physician.password_hash)
        .bind(&physician.especialidad)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::Duplicate(_) => StoreError::Duplicate(DUPLICATE_EMAIL.into()),
            other => other,
        })
    }

    async fn authenticate(
        &self,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<Option<PhysicianIdentity>> {
        let physician = sqlx::query_as::<_, PhysicianIdentity>(
            "SELECT id, nombre, email FROM medicos WHERE email = $1 AND password_hash = $2",
        )
        .bind(email)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(physician)
    }

    async fn find_physician(&self, physician_id: i32) -> StoreResult<Option<PhysicianIdentity>> {
        let physician = sqlx::query_as::<_, PhysicianIdentity>(
            "SELECT id, nombre, email FROM medicos WHERE id = $1",
        )
        .bind(physician_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(physician)
    }

    async fn list_appointments(&self, physician_id: i32) -> StoreResult<Vec<Appointment>> {
        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM citas WHERE medico_id = $1 ORDER BY fecha, hora"
        );

        let citas = sqlx::query_as::<_, Appointment>(&sql)
            .bind(physician_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(citas)
    }

    async fn list_patients(&self, physician_id: i32) -> StoreResult<Vec<Patient>> {
        let sql =
            format!("SELECT {PATIENT_COLUMNS} FROM pacientes WHERE medico_id = $1 ORDER BY nombre");

        let pacientes = sqlx::query_as::<_, Patient>(&sql)
            .bind(physician_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(pacientes)
    }

    async fn find_patient(&self, physician_id: i32, patient_id: i32) -> StoreResult<Patient> {
        let sql =
            format!("SELECT {PATIENT_COLUMNS} FROM pacientes WHERE medico_id = $1 AND id = $2");

        sqlx::query_as::<_, Patient>(&sql)
            .bind(physician_id)
            .bind(patient_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(PATIENT_NOT_FOUND.into()))
    }

    async fn patient_summaries(
        &self,
        physician_id: i32,
        patient_id: Option<i32>,
    ) -> StoreResult<Vec<PatientSummary>> {
        let pacientes = sqlx::query_as::<_, PatientSummary>(
            r#"
            SELECT p.id, p.nombre, p.edad, p.email, p.telefono, p.historial, p.fecha_registro,
                   COUNT(c.id) AS citas_count
            FROM pacientes p
            LEFT JOIN citas c ON c.paciente_id = p.id AND c.medico_id = p.medico_id
            WHERE p.medico_id = $1 AND ($2::INT IS NULL OR p.id = $2)
            GROUP BY p.id
            ORDER BY p.nombre
            "#,
        )
        .bind(physician_id)
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(pacientes)
    }

    async fn patient_history(
        &self,
        physician_id: i32,
        patient_id: i32,
    ) -> StoreResult<(Patient, Vec<Appointment>)> {
        let paciente = self.find_patient(physician_id, patient_id).await?;

        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM citas \
             WHERE paciente_id = $1 AND medico_id = $2 \
             ORDER BY fecha DESC, hora DESC"
        );

        let citas = sqlx::query_as::<_, Appointment>(&sql)
            .bind(patient_id)
            .bind(physician_id)
            .fetch_all(&self.pool)
            .await?;

        Ok((paciente, citas))
    }

    #[instrument(skip(self, patient))]
    async fn create_patient(&self, physician_id: i32, patient: NewPatient) -> StoreResult<Patient> {
        let sql = format!(
            "INSERT INTO pacientes (medico_id, nombre, edad, email, telefono, historial) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {PATIENT_COLUMNS}"
        );

        let paciente = sqlx::query_as::<_, Patient>(&sql)
            .bind(physician_id)
            .bind(&patient.nombre)
            .bind(patient.edad)
            .bind(&patient.email)
            .bind(&patient.telefono)
            .bind(&patient.historial)
            .fetch_one(&self.pool)
            .await?;

        Ok(paciente)
    }

    #[instrument(skip(self, appointment))]
    async fn create_appointment(
        &self,
        physician_id: i32,
        patient_id: i32,
        appointment: NewAppointment,
    ) -> StoreResult<Appointment> {
        let mut tx = self.pool.begin().await?;

        let owned: Option<(i32,)> =
            sqlx::query_as("SELECT id FROM pacientes WHERE id = $1 AND medico_id = $2 FOR SHARE")
                .bind(patient_id)
                .bind(physician_id)
                .fetch_optional(&mut *tx)
                .await?;

        if owned.is_none() {
            return Err(StoreError::NotFound(PATIENT_NOT_FOUND.into()));
        }

        // The unique index makes concurrent identical inserts collapse into
        // one; NOT EXISTS covers databases where the index could not be built.
        let sql = format!(
            "INSERT INTO citas (medico_id, paciente_id, fecha, hora, motivo) \
             SELECT $1, $2, $3::DATE, $4::TIME, $5 \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM citas \
                 WHERE medico_id = $1 AND paciente_id = $2 \
                   AND fecha = $3::DATE AND hora = $4::TIME AND motivo = $5 \
             ) \
             ON CONFLICT DO NOTHING \
             RETURNING {APPOINTMENT_COLUMNS}"
        );

        let inserted = sqlx::query_as::<_, Appointment>(&sql)
            .bind(physician_id)
            .bind(patient_id)
            .bind(appointment.fecha)
            .bind(appointment.hora)
            .bind(&appointment.motivo)
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;

        inserted.ok_or_else(|| StoreError::Duplicate(DUPLICATE_APPOINTMENT.into()))
    }

    async fn cancel_appointment(&self, physician_id: i32, appointment_id: i32) -> StoreResult<u64> {
        let result =
            sqlx::query("UPDATE citas SET cancelada = TRUE WHERE id = $1 AND medico_id = $2")
                .bind(appointment_id)
                .bind(physician_id)
                .execute(&self.pool)
                .await?;

        debug!(rows = result.rows_affected(), "Cancel statement applied");

        Ok(result.rows_affected())
    }

    async fn appointment_count(&self, physician_id: i32, patient_id: i32) -> StoreResult<i64> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM citas WHERE paciente_id = $1 AND medico_id = $2")
                .bind(patient_id)
                .bind(physician_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(total)
    }

    #[instrument(skip(self))]
    async fn delete_patient(&self, physician_id: i32, patient_id: i32) -> StoreResult<String> {
        let mut tx = self.pool.begin().await?;

        let (nombre,): (String,) = sqlx::query_as(
            "SELECT nombre FROM pacientes WHERE id = $1 AND medico_id = $2 FOR UPDATE",
        )
        .bind(patient_id)
        .bind(physician_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(PATIENT_NOT_FOUND.into()))?;

        sqlx::query("DELETE FROM citas WHERE paciente_id = $1 AND medico_id = $2")
            .bind(patient_id)
            .bind(physician_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM pacientes WHERE id = $1 AND medico_id = $2")
            .bind(patient_id)
            .bind(physician_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(nombre)
    }

    async fn ping(&self) -> StoreResult<()> {
        health_check(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}
