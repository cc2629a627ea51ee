//! Appointment cancellation and the JSON endpoints.

use axum::{
    extract::State,
    Form, Json,
};
use tracing::info;

use super::forms::CancelForm;
use super::{history_path, Notice, RecordId};
use crate::auth::CurrentPhysician;
use crate::error::AppError;
use crate::models::{AppointmentJson, Patient};
use crate::store::StoreError;
use crate::AppState;

/// Soft-cancel one of the physician's appointments.
///
/// Another physician's appointment is left untouched; the response does not
/// reveal whether it exists.
pub async fn cancel_appointment(
    State(state): State<AppState>,
    physician: CurrentPhysician,
    RecordId(cita_id): RecordId,
    Form(form): Form<CancelForm>,
) -> Notice {
    let back = match form.return_to_history() {
        Some(patient_id) => Notice::to(history_path(patient_id)),
        None => Notice::to("/dashboard"),
    };

    match state.store.cancel_appointment(physician.id, cita_id).await {
        Ok(rows) => {
            info!(
                event = "appointment.cancelled",
                medico_id = physician.id,
                cita_id,
                rows,
                "Appointment cancellation requested"
            );
            back.success("Cita cancelada correctamente.")
        }
        Err(StoreError::Connection(_)) => back.failure("Error de conexión a la base de datos."),
        Err(e) => back.failure(format!("Error al cancelar la cita: {}", e)),
    }
}

/// The physician's appointments as JSON, by date then time.
pub async fn api_citas(
    State(state): State<AppState>,
    physician: CurrentPhysician,
) -> Result<Json<Vec<AppointmentJson>>, AppError> {
    let citas = state.store.list_appointments(physician.id).await?;
    Ok(Json(citas.iter().map(AppointmentJson::from).collect()))
}

/// The physician's patients as JSON, by name.
pub async fn api_pacientes(
    State(state): State<AppState>,
    physician: CurrentPhysician,
) -> Result<Json<Vec<Patient>>, AppError> {
    Ok(Json(state.store.list_patients(physician.id).await?))
}
