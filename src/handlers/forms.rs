//! Form bodies and their checks.
//!
//! Every field defaults to empty so a missing field reaches the same
//! "required" message as a blank one instead of a rejection page.

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::models::{NewAppointment, NewPatient};

/// Typed literal required to delete a patient.
pub const DELETE_CONFIRMATION: &str = "ELIMINAR";

/// Check a form, yielding the user-facing message on failure.
pub trait Validate {
    fn validate(&self) -> Result<(), &'static str>;
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn optional(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl Validate for LoginForm {
    fn validate(&self) -> Result<(), &'static str> {
        if blank(&self.email) || self.password.is_empty() {
            return Err("Por favor completa todos los campos");
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub nombre: String,
    pub email: String,
    pub password: String,
    pub especialidad: String,
}

impl Validate for RegisterForm {
    fn validate(&self) -> Result<(), &'static str> {
        if blank(&self.nombre) || blank(&self.email) || self.password.is_empty() {
            return Err("Por favor completa todos los campos obligatorios");
        }
        Ok(())
    }
}

impl RegisterForm {
    pub fn especialidad(&self) -> Option<String> {
        optional(self.especialidad.clone())
    }
}

/// `fecha_registro` is accepted for compatibility with older pages and
/// ignored; the store stamps the registration time.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PatientForm {
    pub nombre: String,
    pub edad: String,
    pub email: String,
    pub telefono: String,
    pub fecha_registro: String,
    pub historial: String,
}

impl PatientForm {
    pub fn into_new_patient(self) -> Result<NewPatient, &'static str> {
        if blank(&self.nombre) || blank(&self.edad) || blank(&self.email) {
            return Err("Por favor completa los campos obligatorios.");
        }
        let edad: i32 = self.edad.trim().parse().map_err(|_| "Edad inválida.")?;

        Ok(NewPatient {
            nombre: self.nombre.trim().to_string(),
            edad,
            email: self.email.trim().to_string(),
            telefono: optional(self.telefono),
            historial: optional(self.historial),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppointmentForm {
    pub fecha: String,
    pub hora: String,
    pub motivo: String,
}

/// Browsers send `HH:MM`; some clients include seconds.
fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

impl AppointmentForm {
    pub fn into_new_appointment(self) -> Result<NewAppointment, &'static str> {
        if blank(&self.fecha) || blank(&self.hora) || blank(&self.motivo) {
            return Err("Por favor completa todos los campos.");
        }
        let fecha = NaiveDate::parse_from_str(self.fecha.trim(), "%Y-%m-%d").ok();
        let hora = parse_time(self.hora.trim());
        let (Some(fecha), Some(hora)) = (fecha, hora) else {
            return Err("Fecha u hora inválida.");
        };

        Ok(NewAppointment {
            fecha,
            hora,
            motivo: self.motivo.trim().to_string(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CancelForm {
    pub redirect_to: String,
    pub paciente_id: String,
}

impl CancelForm {
    /// Patient whose history should be shown afterwards, if any.
    pub fn return_to_history(&self) -> Option<i32> {
        if self.redirect_to != "historial" {
            return None;
        }
        self.paciente_id.trim().parse().ok()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteForm {
    pub confirmacion: String,
}

impl DeleteForm {
    pub fn confirmed(&self) -> bool {
        self.confirmacion.trim().to_uppercase() == DELETE_CONFIRMATION
    }
}
