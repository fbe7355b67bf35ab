use axum::http::StatusCode;
use axum::response::Response;
use kubedev_orchestrator::Error;

/// Maps the orchestrator's flat error taxonomy (§7) onto HTTP status
/// codes. Every branch goes through [`kubedev_common::response`] so the
/// error is both logged (colorized, to stderr) and returned as
/// `{"reason": "..."}`.
pub fn into_response(err: Error) -> Response {
    use kubedev_common::response::*;

    let status = status_for(&err);
    match status {
        StatusCode::NOT_FOUND => not_found(err),
        StatusCode::FORBIDDEN => forbidden(err),
        StatusCode::CONFLICT => conflict(err),
        StatusCode::PRECONDITION_FAILED => precondition_failed(err),
        StatusCode::SERVICE_UNAVAILABLE => service_unavailable(err),
        StatusCode::GATEWAY_TIMEOUT => gateway_timeout(err),
        StatusCode::BAD_REQUEST => bad_request(err),
        _ => internal_server_error(err),
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotFound => StatusCode::NOT_FOUND,
        Error::Forbidden => StatusCode::FORBIDDEN,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
        Error::ClusterUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        Error::MalformedSpec(_) | Error::InvalidKind(_) => StatusCode::BAD_REQUEST,
        Error::Internal(_) | Error::Kube { .. } | Error::Db { .. } | Error::Pool { .. }
        | Error::Json { .. } | Error::Yaml { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
