//! # consultorio
//!
//! Clinic management web application. Physicians register and log in,
//! keep patient records, and schedule or cancel appointments. Pages are
//! server-rendered; `/api/citas` and `/api/pacientes` answer with JSON.
//!
//! ## Layout
//!
//! - [`store`]: the [`store::ClinicStore`] trait with PostgreSQL and
//!   in-memory backends
//! - [`auth`]: the session gate in front of physician-only routes
//! - [`handlers`]: one handler per user action
//! - [`session`], [`views`]: server-side sessions and embedded templates
//! - [`config`], [`database`], [`schema`], [`observability`], [`layers`]:
//!   startup and plumbing
//!
//! ```ignore
//! let state = AppState::new(Arc::new(MemoryStore::new()), SessionPolicy::default())?;
//! let app = build_router(state, &HttpConfig::default());
//! ```

pub mod auth;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod handlers;
pub mod layers;
pub mod models;
pub mod observability;
pub mod parse;
pub mod schema;
pub mod session;
pub mod store;
pub mod views;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::auth::require_physician;
use crate::layers::{HttpConfig, HttpLayers};
use crate::session::{SessionPolicy, SessionStore};
use crate::store::ClinicStore;
use crate::views::Views;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ClinicStore>,
    pub sessions: SessionStore,
    pub views: Arc<Views>,
}

impl AppState {
    /// Fails only if the embedded templates do not parse.
    pub fn new(store: Arc<dyn ClinicStore>, policy: SessionPolicy) -> Result<Self, tera::Error> {
        Ok(Self {
            store,
            sessions: SessionStore::new(policy),
            views: Arc::new(Views::new()?),
        })
    }
}

pub fn build_router(state: AppState, http: &HttpConfig) -> Router {
    use handlers::{appointments, auth, dashboard, health, patients};

    // Public routes
    let public_routes = Router::new()
        .route("/", get(auth::index))
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/logout", get(auth::logout))
        .route("/health", get(health::health));

    // Physician-only routes
    let protected_routes = Router::new()
        .route(
            "/dashboard",
            get(dashboard::dashboard).post(dashboard::dashboard),
        )
        .route("/agregar_paciente", post(dashboard::add_patient))
        .route("/historial/:id", get(patients::history))
        .route("/historial/:id/agregar_cita", post(patients::add_appointment))
        .route("/cancelar_cita/:id", post(appointments::cancel_appointment))
        .route(
            "/eliminar_paciente/confirmacion/:id",
            get(patients::confirm_delete),
        )
        .route("/eliminar_paciente/:id", post(patients::delete_patient))
        .route("/api/citas", get(appointments::api_citas))
        .route("/api/pacientes", get(appointments::api_pacientes))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_physician,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .with_http_layers(http)
}
