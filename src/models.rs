//! Clinic domain records.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// Stored physician account.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Physician {
    pub id: i32,
    pub nombre: String,
    pub email: String,
    pub especialidad: Option<String>,
    pub fecha_registro: NaiveDateTime,
}

/// The identity fields carried in a session.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PhysicianIdentity {
    pub id: i32,
    pub nombre: String,
    pub email: String,
}

/// Registration input. `password_hash` is already digested.
#[derive(Debug, Clone)]
pub struct NewPhysician {
    pub nombre: String,
    pub email: String,
    pub password_hash: String,
    pub especialidad: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Patient {
    pub id: i32,
    pub nombre: String,
    pub edad: Option<i32>,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub historial: Option<String>,
    pub fecha_registro: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPatient {
    pub nombre: String,
    pub edad: i32,
    pub email: String,
    pub telefono: Option<String>,
    pub historial: Option<String>,
}

/// A patient row on the dashboard, with its appointment count.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PatientSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub patient: Patient,
    pub citas_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: i32,
    pub paciente_id: i32,
    pub medico_id: i32,
    pub fecha: NaiveDate,
    pub hora: NaiveTime,
    pub motivo: Option<String>,
    pub cancelada: bool,
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub fecha: NaiveDate,
    pub hora: NaiveTime,
    pub motivo: String,
}

/// JSON shape served by `/api/citas`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentJson {
    pub fecha: String,
    pub hora: String,
    pub motivo: Option<String>,
    pub id: i32,
}

impl From<&Appointment> for AppointmentJson {
    fn from(cita: &Appointment) -> Self {
        Self {
            fecha: cita.fecha.format("%Y-%m-%d").to_string(),
            hora: cita.hora.format("%H:%M:%S").to_string(),
            motivo: cita.motivo.clone(),
            id: cita.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appointment_json_formats_date_and_time() {
        let cita = Appointment {
            id: 7,
            paciente_id: 1,
            medico_id: 1,
            fecha: NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
            hora: NaiveTime::from_hms_opt(8, 5, 0).unwrap(),
            motivo: Some("Control".into()),
            cancelada: false,
        };

        let json = serde_json::to_value(AppointmentJson::from(&cita)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"fecha": "2025-03-09", "hora": "08:05:00", "motivo": "Control", "id": 7})
        );
    }
}
