use super::error::ApiError;
use super::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use tracing::debug;

/// Remote address of the caller, as seen by the listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl ClientIdentity {
    fn from_request(request: &Request) -> Self {
        let identity = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Self(identity)
    }
}

fn is_mutation(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::DELETE)
}

/// Resolve the caller's identity and gate mutating requests on the limiter.
pub(crate) async fn admit_mutations(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = ClientIdentity::from_request(&request);

    if is_mutation(request.method()) {
        if let Err(rejected) = state.limiter.admit_or_reject(&identity.0) {
            debug!(path = %request.uri().path(), "Mutation refused by admission control");
            return ApiError(rejected).into_response();
        }
    }

    request.extensions_mut().insert(identity);
    next.run(request).await
}
