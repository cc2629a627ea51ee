//! Session gate for physician-only routes.
//!
//! [`require_physician`] re-checks the session's physician against the store
//! on every request. Handlers behind it take a [`CurrentPhysician`] argument.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::handlers::found;
use crate::session::{clear_session_cookie, session_id, SessionData};
use crate::store::StoreError;
use crate::AppState;

/// The physician behind the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentPhysician {
    pub id: i32,
    pub nombre: String,
    pub email: String,
}

impl From<SessionData> for CurrentPhysician {
    fn from(session: SessionData) -> Self {
        Self {
            id: session.medico_id,
            nombre: session.medico_nombre,
            email: session.medico_email,
        }
    }
}

/// Middleware that admits only requests with a live physician session.
///
/// - no session: redirect to `/`
/// - physician no longer exists: drop the session, redirect to `/`
/// - database unreachable: redirect to `/`, session kept for when it returns
/// - any other store error: drop the session, redirect to `/`
pub async fn require_physician(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(sid) = session_id(&jar) else {
        return found("/");
    };
    let Some(session) = state.sessions.touch(sid) else {
        debug!("Unknown or expired session");
        return (clear_session_cookie(jar), found("/")).into_response();
    };

    match state.store.find_physician(session.medico_id).await {
        Ok(Some(physician)) => {
            // Handlers see the session's identity with the name just read
            let Some(refreshed) = state.sessions.refresh_name(sid, &physician.nombre) else {
                return found("/");
            };
            request
                .extensions_mut()
                .insert(CurrentPhysician::from(refreshed));
            next.run(request).await
        }
        Ok(None) => {
            warn!(
                event = "session.stale",
                medico_id = session.medico_id,
                "Session refers to a physician that no longer exists"
            );
            state.sessions.remove(sid);
            (clear_session_cookie(jar), found("/")).into_response()
        }
        Err(StoreError::Connection(e)) => {
            warn!(
                medico_id = session.medico_id,
                error = %e,
                "Database unreachable while validating session"
            );
            found("/")
        }
        Err(e) => {
            warn!(
                event = "session.stale",
                medico_id = session.medico_id,
                error = %e,
                "Session validation failed"
            );
            state.sessions.remove(sid);
            (clear_session_cookie(jar), found("/")).into_response()
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentPhysician
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentPhysician>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("No autenticado"))
    }
}
