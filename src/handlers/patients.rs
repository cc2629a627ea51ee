//! Patient history, appointment booking and patient deletion.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use tracing::{info, warn};

use super::forms::{AppointmentForm, DeleteForm};
use super::{found, history_path, today, MessageQuery, Notice, RecordId};
use crate::auth::CurrentPhysician;
use crate::error::AppError;
use crate::store::StoreError;
use crate::views::{AppointmentView, ConfirmDeletePage, HistoryPage};
use crate::AppState;

const NOT_OWNED: &str = "Paciente no encontrado o no autorizado.";

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(flatten)]
    pub message: MessageQuery,
    pub nueva_cita: Option<String>,
}

/// A patient's record with every appointment, newest first.
pub async fn history(
    State(state): State<AppState>,
    physician: CurrentPhysician,
    RecordId(patient_id): RecordId,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, AppError> {
    let dashboard = Notice::to("/dashboard");

    let (paciente, citas) = match state.store.patient_history(physician.id, patient_id).await {
        Ok(record) => record,
        Err(StoreError::NotFound(_)) => return Ok(dashboard.failure(NOT_OWNED).into_response()),
        Err(StoreError::Connection(e)) => {
            return Ok(dashboard.failure(format!("Error BD: {}", e)).into_response())
        }
        Err(e) => {
            return Ok(dashboard
                .failure(format!("Error al obtener historial: {}", e))
                .into_response())
        }
    };

    let citas_canceladas = citas.iter().filter(|c| c.cancelada).count();
    let page = HistoryPage {
        paciente: paciente.into(),
        citas_activas: citas.len() - citas_canceladas,
        citas_canceladas,
        citas: citas.into_iter().map(AppointmentView::from).collect(),
        medico_nombre: physician.nombre,
        fecha_hoy: today(),
        success: query.message.success(),
        message: query.message.mensaje,
        nueva_cita: query.nueva_cita.as_deref() == Some("true"),
    };

    Ok(state
        .views
        .render("historial_paciente.html", &page)?
        .into_response())
}

/// Book an appointment from the history page.
pub async fn add_appointment(
    State(state): State<AppState>,
    physician: CurrentPhysician,
    RecordId(patient_id): RecordId,
    Form(form): Form<AppointmentForm>,
) -> Notice {
    let back = Notice::to(history_path(patient_id));

    let appointment = match form.into_new_appointment() {
        Ok(appointment) => appointment,
        Err(message) => return back.failure(message).flag("nueva_cita"),
    };

    match state
        .store
        .create_appointment(physician.id, patient_id, appointment)
        .await
    {
        Ok(cita) => {
            info!(
                event = "appointment.created",
                medico_id = physician.id,
                paciente_id = patient_id,
                cita_id = cita.id,
                "Appointment scheduled"
            );
            back.success("Cita agendada correctamente.")
        }
        Err(StoreError::NotFound(_)) => Notice::to("/dashboard").failure("Paciente no encontrado."),
        Err(StoreError::Duplicate(message)) => back.failure(message).flag("nueva_cita"),
        Err(StoreError::Connection(e)) => back
            .failure(format!("Error BD: {}", e))
            .flag("nueva_cita"),
        Err(e) => back
            .failure(format!("Error al agendar cita: {}", e))
            .flag("nueva_cita"),
    }
}

/// Confirmation page listing how many appointments will go with the patient.
pub async fn confirm_delete(
    State(state): State<AppState>,
    physician: CurrentPhysician,
    RecordId(patient_id): RecordId,
) -> Result<Response, AppError> {
    let dashboard = Notice::to("/dashboard");

    let lookup = async {
        let paciente = state.store.find_patient(physician.id, patient_id).await?;
        let total = state.store.appointment_count(physician.id, patient_id).await?;
        Ok::<_, StoreError>((paciente, total))
    };

    let (paciente, total_citas) = match lookup.await {
        Ok(record) => record,
        Err(StoreError::NotFound(_)) => return Ok(dashboard.failure(NOT_OWNED).into_response()),
        Err(StoreError::Connection(e)) => {
            return Ok(dashboard.failure(format!("Error BD: {}", e)).into_response())
        }
        Err(e) => {
            return Ok(dashboard
                .failure(format!("Error al cargar confirmación: {}", e))
                .into_response())
        }
    };

    let page = ConfirmDeletePage {
        paciente: paciente.into(),
        total_citas,
    };

    Ok(state
        .views
        .render("confirmar_eliminacion.html", &page)?
        .into_response())
}

/// Delete a patient and its appointments once `ELIMINAR` has been typed.
pub async fn delete_patient(
    State(state): State<AppState>,
    physician: CurrentPhysician,
    RecordId(patient_id): RecordId,
    Form(form): Form<DeleteForm>,
) -> Response {
    if !form.confirmed() {
        return found(&format!("/eliminar_paciente/confirmacion/{}", patient_id));
    }

    let back = Notice::to(history_path(patient_id));

    let outcome = match state.store.delete_patient(physician.id, patient_id).await {
        Ok(nombre) => {
            warn!(
                event = "patient.deleted",
                medico_id = physician.id,
                paciente_id = patient_id,
                "Patient and appointments deleted"
            );
            Notice::to("/dashboard").success(format!(
                "Paciente '{}' eliminado correctamente junto con todas sus citas.",
                nombre
            ))
        }
        Err(StoreError::NotFound(_)) => Notice::to("/dashboard").failure(NOT_OWNED),
        Err(StoreError::Connection(e)) => back.failure(format!("Error BD: {}", e)),
        Err(e) => back.failure(format!("Error al eliminar paciente: {}", e)),
    };

    outcome.into_response()
}
