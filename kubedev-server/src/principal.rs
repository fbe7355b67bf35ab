//! Extracts the already-authenticated [`kubedev_types::Principal`] this
//! adapter trusts an upstream auth proxy to have injected as request
//! headers. No credential verification happens here (§1); a deployment
//! that puts this adapter directly on the internet instead of behind an
//! authenticating gateway gets no protection at all.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use kubedev_types::Principal;
use uuid::Uuid;

pub struct PrincipalExtractor(pub Principal);

pub struct MissingPrincipal(&'static str);

impl IntoResponse for MissingPrincipal {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, self.0).into_response()
    }
}

impl<S> FromRequestParts<S> for PrincipalExtractor
where
    S: Send + Sync,
{
    type Rejection = MissingPrincipal;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-principal-id")
            .and_then(|v| v.to_str().ok())
            .ok_or(MissingPrincipal("missing x-principal-id header"))?;
        let id = Uuid::parse_str(id).map_err(|_| MissingPrincipal("x-principal-id is not a uuid"))?;
        let name = parts
            .headers
            .get("x-principal-name")
            .and_then(|v| v.to_str().ok())
            .ok_or(MissingPrincipal("missing x-principal-name header"))?
            .to_string();
        let is_admin = parts
            .headers
            .get("x-principal-admin")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Ok(PrincipalExtractor(Principal { id, name, is_admin }))
    }
}
