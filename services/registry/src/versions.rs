//! Provider versions listing

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::catalog::Catalog;
use crate::error::{RegistryError, RegistryResult};
use crate::storage::RegistryStorage;

/// Router for provider version listings
pub fn router() -> Router<RegistryStorage> {
    Router::new().route(
        "/v1/providers/{namespace}/{type}/versions",
        get(list_versions),
    )
}

/// List the available versions of a provider
///
/// The bucket scan runs as its own task. If the client goes away, axum drops
/// this future, the drop guard fires, and the scan stops requesting pages.
///
/// Path segments that do not decode are rejected with the same JSON error
/// body as segments that fail validation.
#[tracing::instrument(
    skip_all,
    fields(namespace = tracing::field::Empty, provider_type = tracing::field::Empty)
)]
async fn list_versions(
    State(storage): State<RegistryStorage>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> RegistryResult<Json<Catalog>> {
    let Path((namespace, provider_type)) = path?;
    let span = tracing::Span::current();
    span.record("namespace", namespace.as_str());
    span.record("provider_type", provider_type.as_str());

    validate_segment(&namespace)?;
    validate_segment(&provider_type)?;

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let scan = tokio::spawn(
        async move {
            storage
                .provider_catalog(&namespace, &provider_type, &cancel)
                .await
        }
        .in_current_span(),
    );

    let catalog = scan.await??;
    tracing::debug!(versions = catalog.len(), "listed provider versions");
    Ok(Json(catalog))
}

/// Validate a namespace or type path segment
fn validate_segment(segment: &str) -> RegistryResult<()> {
    if segment.is_empty() || segment == "." || segment == ".." || segment.contains('/') {
        return Err(RegistryError::InvalidProvider(segment.to_string()));
    }
    Ok(())
}
