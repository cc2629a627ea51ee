//! Physician dashboard and patient creation.

use axum::{
    extract::{Query, State},
    http::Method,
    response::Html,
    Form,
};
use serde::Deserialize;
use tracing::info;

use super::forms::PatientForm;
use super::{today, Notice};
use crate::auth::CurrentPhysician;
use crate::error::AppError;
use crate::store::StoreError;
use crate::views::{DashboardPage, PatientView};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub mensaje: Option<String>,
    pub exito: Option<String>,
    pub mostrar_formulario: Option<String>,
    pub buscar_id: Option<String>,
}

/// Patient list with appointment counts, or a single patient when
/// `buscar_id` is given.
///
/// Outcome messages from redirects are only shown on `GET`.
pub async fn dashboard(
    State(state): State<AppState>,
    physician: CurrentPhysician,
    method: Method,
    Query(query): Query<DashboardQuery>,
) -> Result<Html<String>, AppError> {
    let (message, success) = if method == Method::GET {
        (
            query.mensaje.clone(),
            query.exito.as_deref().map(|e| e == "True"),
        )
    } else {
        (None, None)
    };

    let buscar_id = query
        .buscar_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let mut error_busqueda = None;
    let mut error_dashboard = None;

    let filter = match buscar_id.map(str::parse::<i32>) {
        Some(Ok(id)) => Some(Some(id)),
        Some(Err(_)) => {
            error_busqueda = Some("ID inválido".to_string());
            None
        }
        None => Some(None),
    };

    let pacientes = match filter {
        Some(patient_id) => match state.store.patient_summaries(physician.id, patient_id).await {
            Ok(summaries) => {
                if patient_id.is_some() && summaries.is_empty() {
                    error_busqueda = Some("Paciente no encontrado".to_string());
                }
                summaries.into_iter().map(PatientView::from).collect()
            }
            Err(e) => {
                error_dashboard = Some(format!("Error BD: {}", e));
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let page = DashboardPage {
        user_name: physician.nombre,
        pacientes,
        message,
        success,
        error_dashboard,
        error_busqueda,
        buscar_id: buscar_id.map(str::to_string),
        mostrar_formulario: query.mostrar_formulario.as_deref() == Some("true"),
        fecha_hoy: today(),
    };

    state.views.render("dashboard.html", &page)
}

/// Create a patient owned by the current physician.
///
/// Failures keep the creation form open on the dashboard.
pub async fn add_patient(
    State(state): State<AppState>,
    physician: CurrentPhysician,
    Form(form): Form<PatientForm>,
) -> Notice {
    let dashboard = Notice::to("/dashboard");

    let patient = match form.into_new_patient() {
        Ok(patient) => patient,
        Err(message) => return dashboard.failure(message).flag("mostrar_formulario"),
    };

    match state.store.create_patient(physician.id, patient).await {
        Ok(created) => {
            info!(
                event = "patient.created",
                medico_id = physician.id,
                paciente_id = created.id,
                "Patient created"
            );
            dashboard.success(format!("Paciente '{}' agregado correctamente.", created.nombre))
        }
        Err(StoreError::Connection(e)) => dashboard
            .failure(format!("Error BD: {}", e))
            .flag("mostrar_formulario"),
        Err(e) => dashboard
            .failure(format!("Error al agregar paciente: {}", e))
            .flag("mostrar_formulario"),
    }
}
