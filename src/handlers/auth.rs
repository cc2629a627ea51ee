//! Entry page, login, registration and logout.

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{info, warn};

use super::forms::{LoginForm, RegisterForm, Validate};
use super::found;
use crate::crypto::hash_password;
use crate::error::AppError;
use crate::models::NewPhysician;
use crate::session::{clear_session_cookie, session_cookie, session_id};
use crate::store::StoreError;
use crate::views::IndexPage;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    pub show_register: Option<String>,
}

fn render_index(state: &AppState, page: IndexPage) -> Result<Html<String>, AppError> {
    state.views.render("index.html", &page)
}

/// Entry page with the login form, or the registration form when
/// `show_register=1`.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<IndexQuery>,
) -> Result<Html<String>, AppError> {
    render_index(
        &state,
        IndexPage {
            show_register: query.show_register.as_deref() == Some("1"),
            ..IndexPage::default()
        },
    )
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if let Err(message) = form.validate() {
        return Ok(render_index(&state, IndexPage::failure(message, false))?.into_response());
    }

    let email = form.email.trim();
    let digest = hash_password(&form.password);

    match state.store.authenticate(email, &digest).await {
        Ok(Some(physician)) => {
            // A fresh id on every login; any previous session is dropped.
            if let Some(previous) = session_id(&jar) {
                state.sessions.remove(previous);
            }
            let sid = state.sessions.create(&physician);

            info!(
                event = "auth.success",
                medico_id = physician.id,
                "Physician logged in"
            );

            Ok((jar.add(session_cookie(sid)), found("/dashboard")).into_response())
        }
        Ok(None) => {
            warn!(event = "auth.failed", email = %email, "Invalid credentials");
            Ok(render_index(&state, IndexPage::failure("Credenciales incorrectas", false))?
                .into_response())
        }
        Err(StoreError::Connection(e)) => Ok(render_index(
            &state,
            IndexPage::failure(format!("Error de conexión a la base de datos: {}", e), false),
        )?
        .into_response()),
        Err(e) => Ok(render_index(
            &state,
            IndexPage::failure(format!("Error en la base de datos: {}", e), false),
        )?
        .into_response()),
    }
}

pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Html<String>, AppError> {
    if let Err(message) = form.validate() {
        return render_index(&state, IndexPage::failure(message, true));
    }

    let physician = NewPhysician {
        nombre: form.nombre.trim().to_string(),
        email: form.email.trim().to_string(),
        password_hash: hash_password(&form.password),
        especialidad: form.especialidad(),
    };

    let page = match state.store.register_physician(physician).await {
        Ok(created) => {
            info!(
                event = "physician.registered",
                medico_id = created.id,
                "Physician registered"
            );
            IndexPage {
                message: Some("Registro exitoso. Ahora puedes iniciar sesión.".into()),
                success: Some(true),
                show_register: false,
            }
        }
        Err(StoreError::Duplicate(message)) => IndexPage::failure(message, true),
        Err(StoreError::Connection(e)) => {
            IndexPage::failure(format!("Error de conexión a la base de datos: {}", e), true)
        }
        Err(e) => IndexPage::failure(format!("Error en el registro: {}", e), true),
    };

    render_index(&state, page)
}

/// Drop the session, whatever its state, and go back to the entry page.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(sid) = session_id(&jar) {
        state.sessions.remove(sid);
    }
    (clear_session_cookie(jar), found("/")).into_response()
}
