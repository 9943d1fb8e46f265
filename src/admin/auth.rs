use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Token required by the status endpoint.
#[derive(Clone)]
pub struct AuthState {
    pub token: String,
}

impl AuthState {
    pub fn is_valid(&self, candidate: &str) -> bool {
        candidate == self.token
    }
}

pub async fn status_auth_middleware(State(auth): State<AuthState>, request: Request, next: Next) -> Response {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match bearer {
        Some(token) if auth.is_valid(token) => next.run(request).await,
        _ => (StatusCode::UNAUTHORIZED, "Invalid or missing auth token").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_must_match_exactly() {
        let auth = AuthState { token: "secret".to_string() };
        assert!(auth.is_valid("secret"));
        assert!(!auth.is_valid("secret "));
        assert!(!auth.is_valid(""));
    }
}
