use argus_core::{Unauthenticated, VerifiedIdentity};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::infra::{app_state::AppState, errors::AppError};

/// Verify the bearer credential and expose the [`VerifiedIdentity`] to
/// downstream handlers as a request extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers()).ok_or(Unauthenticated::MissingCredential)?;
    let identity = state.identity.verify(token).await.inspect_err(|err| {
        debug!(error = %err, "rejected bearer credential");
    })?;

    request.extensions_mut().insert::<VerifiedIdentity>(identity);
    Ok(next.run(request).await)
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(extract_bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(extract_bearer_token(&headers("Basic abc")), None);
        assert_eq!(extract_bearer_token(&headers("Bearer   ")), None);
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }
}
