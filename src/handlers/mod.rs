//! Route handlers.
//!
//! HTML actions answer with a rendered page or a `302 Found` whose query
//! string carries the outcome (`mensaje`, `exito`) back to the page that
//! displays it. JSON endpoints answer with [`AppError`](crate::error::AppError)
//! on failure.

pub mod appointments;
pub mod auth;
pub mod dashboard;
mod forms;
pub mod health;
pub mod patients;


use axum::{
    extract::{FromRequestParts, Path},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use url::form_urlencoded;

/// Plain `302 Found` to `location`.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Redirect carrying a status message for the target page.
#[derive(Debug)]
pub(crate) struct Notice {
    path: String,
    params: Vec<(&'static str, String)>,
}

impl Notice {
    pub fn to(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
        }
    }

    pub fn success(self, mensaje: impl Into<String>) -> Self {
        self.message(mensaje, true)
    }

    pub fn failure(self, mensaje: impl Into<String>) -> Self {
        self.message(mensaje, false)
    }

    fn message(mut self, mensaje: impl Into<String>, exito: bool) -> Self {
        self.params.push(("mensaje", mensaje.into()));
        self.params
            .push(("exito", if exito { "True" } else { "False" }.to_string()));
        self
    }

    /// Ask the target page to open one of its forms.
    pub fn flag(mut self, name: &'static str) -> Self {
        self.params.push((name, "true".to_string()));
        self
    }

    pub fn location(&self) -> String {
        if self.params.is_empty() {
            return self.path.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter().map(|(k, v)| (*k, v.as_str())))
            .finish();
        format!("{}?{}", self.path, query)
    }
}

impl IntoResponse for Notice {
    fn into_response(self) -> Response {
        found(&self.location())
    }
}

/// Numeric id from the route path. Anything else is a `404 Not Found`,
/// not a `400`, so `/historial/abc` looks like any other missing page.
#[derive(Debug, Clone, Copy)]
pub struct RecordId(pub i32);

#[axum::async_trait]
impl<S> FromRequestParts<S> for RecordId
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<i32>::from_request_parts(parts, state)
            .await
            .map(|Path(id)| RecordId(id))
            .map_err(|_| StatusCode::NOT_FOUND)
    }
}

/// Message parameters read back by the pages that show them.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub mensaje: Option<String>,
    pub exito: Option<String>,
}

impl MessageQuery {
    pub fn success(&self) -> Option<bool> {
        self.exito.as_deref().map(|e| e == "True")
    }
}

fn history_path(patient_id: i32) -> String {
    format!("/historial/{}", patient_id)
}

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}
