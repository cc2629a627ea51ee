//! Server-rendered pages.
//!
//! Templates are compiled into the binary and parsed once at startup. Every
//! page has a context struct below; dates are formatted here so templates
//! stay free of filters.

use axum::response::Html;
use chrono::NaiveDateTime;
use serde::Serialize;
use tera::{Context, Tera};

use crate::error::AppError;
use crate::models::{Appointment, Patient, PatientSummary};

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("dashboard.html", include_str!("../templates/dashboard.html")),
    (
        "historial_paciente.html",
        include_str!("../templates/historial_paciente.html"),
    ),
    (
        "confirmar_eliminacion.html",
        include_str!("../templates/confirmar_eliminacion.html"),
    ),
];

/// Compiled template set.
pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        Ok(Self { tera })
    }

    pub fn render<T: Serialize>(&self, template: &str, page: &T) -> Result<Html<String>, AppError> {
        let context = Context::from_serialize(page)?;
        Ok(Html(self.tera.render(template, &context)?))
    }
}

fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// Patient as shown in tables and headers.
#[derive(Debug, Serialize)]
pub struct PatientView {
    pub id: i32,
    pub nombre: String,
    pub edad: Option<i32>,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub historial: Option<String>,
    pub fecha_registro: String,
    pub citas_count: Option<i64>,
}

impl From<Patient> for PatientView {
    fn from(p: Patient) -> Self {
        Self {
            fecha_registro: format_timestamp(&p.fecha_registro),
            id: p.id,
            nombre: p.nombre,
            edad: p.edad,
            email: p.email,
            telefono: p.telefono,
            historial: p.historial,
            citas_count: None,
        }
    }
}

impl From<PatientSummary> for PatientView {
    fn from(summary: PatientSummary) -> Self {
        Self {
            citas_count: Some(summary.citas_count),
            ..Self::from(summary.patient)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AppointmentView {
    pub id: i32,
    pub fecha: String,
    pub hora: String,
    pub motivo: Option<String>,
    pub cancelada: bool,
}

impl From<Appointment> for AppointmentView {
    fn from(c: Appointment) -> Self {
        Self {
            id: c.id,
            fecha: c.fecha.format("%Y-%m-%d").to_string(),
            hora: c.hora.format("%H:%M").to_string(),
            motivo: c.motivo,
            cancelada: c.cancelada,
        }
    }
}

/// `index.html`: login and registration.
#[derive(Debug, Default, Serialize)]
pub struct IndexPage {
    pub message: Option<String>,
    pub success: Option<bool>,
    pub show_register: bool,
}

impl IndexPage {
    pub fn failure(message: impl Into<String>, show_register: bool) -> Self {
        Self {
            message: Some(message.into()),
            success: Some(false),
            show_register,
        }
    }
}

/// `dashboard.html`: the physician's patients.
#[derive(Debug, Serialize)]
pub struct DashboardPage {
    pub user_name: String,
    pub pacientes: Vec<PatientView>,
    pub message: Option<String>,
    pub success: Option<bool>,
    pub error_dashboard: Option<String>,
    pub error_busqueda: Option<String>,
    pub buscar_id: Option<String>,
    pub mostrar_formulario: bool,
    pub fecha_hoy: String,
}

/// `historial_paciente.html`: one patient's record and appointments.
#[derive(Debug, Serialize)]
pub struct HistoryPage {
    pub paciente: PatientView,
    pub citas: Vec<AppointmentView>,
    pub citas_activas: usize,
    pub citas_canceladas: usize,
    pub medico_nombre: String,
    pub fecha_hoy: String,
    pub message: Option<String>,
    pub success: Option<bool>,
    pub nueva_cita: bool,
}

/// `confirmar_eliminacion.html`
#[derive(Debug, Serialize)]
pub struct ConfirmDeletePage {
    pub paciente: PatientView,
    pub total_citas: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn patient(nombre: &str) -> Patient {
        Patient {
            id: 7,
            nombre: nombre.into(),
            edad: Some(52),
            email: Some("paciente@correo.com".into()),
            telefono: None,
            historial: Some("Hipertensión".into()),
            fecha_registro: NaiveDate::from_ymd_opt(2025, 3, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_all_templates_compile() {
        assert!(Views::new().is_ok());
    }

    #[test]
    fn test_index_shows_login_by_default() {
        let views = Views::new().unwrap();
        let Html(body) = views.render("index.html", &IndexPage::default()).unwrap();

        assert!(body.contains("action=\"/login\""));
        assert!(body.contains("name=\"email\""));
        assert!(!body.contains("action=\"/register\""));
    }

    #[test]
    fn test_index_failure_message() {
        let views = Views::new().unwrap();
        let page = IndexPage::failure("Este email ya está registrado", true);
        let Html(body) = views.render("index.html", &page).unwrap();

        assert!(body.contains("Este email ya está registrado"));
        assert!(body.contains("action=\"/register\""));
        assert!(body.contains("alert-error"));
    }

    #[test]
    fn test_patient_fields_are_escaped() {
        let views = Views::new().unwrap();
        let page = DashboardPage {
            user_name: "Ana".into(),
            pacientes: vec![patient("<script>alert(1)</script>").into()],
            message: None,
            success: None,
            error_dashboard: None,
            error_busqueda: None,
            buscar_id: None,
            mostrar_formulario: false,
            fecha_hoy: "2025-03-01".into(),
        };
        let Html(body) = views.render("dashboard.html", &page).unwrap();

        assert!(!body.contains("<script>alert(1)</script>"));
        assert!(body.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_history_page_renders_appointments() {
        let views = Views::new().unwrap();
        let cita = Appointment {
            id: 3,
            paciente_id: 7,
            medico_id: 1,
            fecha: NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            hora: NaiveTime::from_hms_opt(10, 15, 0).unwrap(),
            motivo: Some("Revisión".into()),
            cancelada: false,
        };
        let page = HistoryPage {
            paciente: patient("Luis").into(),
            citas: vec![cita.into()],
            citas_activas: 1,
            citas_canceladas: 0,
            medico_nombre: "Ana".into(),
            fecha_hoy: "2025-03-01".into(),
            message: Some("Cita agendada correctamente.".into()),
            success: Some(true),
            nueva_cita: false,
        };
        let Html(body) = views.render("historial_paciente.html", &page).unwrap();

        assert!(body.contains("2025-04-02"));
        assert!(body.contains("10:15"));
        assert!(body.contains("/cancelar_cita/3"));
        assert!(body.contains("alert-success"));
    }

    #[test]
    fn test_confirm_page_has_no_alert() {
        let views = Views::new().unwrap();
        let page = ConfirmDeletePage {
            paciente: patient("Luis").into(),
            total_citas: 3,
        };
        let Html(body) = views.render("confirmar_eliminacion.html", &page).unwrap();

        assert!(body.contains("3 cita(s)"));
        assert!(body.contains("name=\"confirmacion\""));
        assert!(!body.contains("role=\"alert\""));
    }

    #[test]
    fn test_summary_view_carries_count() {
        let view: PatientView = PatientSummary {
            patient: patient("Luis"),
            citas_count: 4,
        }
        .into();

        assert_eq!(view.citas_count, Some(4));
        assert_eq!(view.fecha_registro, "2025-03-01 09:30");
    }
}
