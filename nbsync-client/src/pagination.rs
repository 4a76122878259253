//! Batched listing by id.
//!
//! Nautobot list endpoints take `id=<uuid>` filters in the query string. Long
//! id lists blow past URL length limits, so ids are sent in fixed-size
//! batches. A failing batch is reported and skipped; the remaining batches
//! still run.

use std::future::Future;

use tracing::info;

use crate::error::ClientError;
use crate::report::Report;

/// Ids per request.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Run `api_call` once per batch of `ids` (sequentially) and concatenate the
/// results.
///
/// `fields` are extra `key=value` identifiers appended to report lines for
/// failed batches. An empty `ids` returns an empty result without calling the
/// API.
pub async fn paginated_list_with_ids<T, F, Fut>(
    report: &Report,
    operation: &str,
    ids: &[String],
    batch_size: usize,
    fields: &[(&str, &str)],
    mut api_call: F,
) -> Vec<T>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ClientError>>,
{
    if ids.is_empty() {
        info!(operation, "no ids for operation");
        return Vec::new();
    }

    let batch_size = batch_size.max(1);
    let mut results = Vec::new();

    for (index, batch) in ids.chunks(batch_size).enumerate() {
        match api_call(batch.to_vec()).await {
            Ok(items) => results.extend(items),
            Err(e) => {
                let batch_num = (index + 1).to_string();
                let error = e.to_string();
                let mut line_fields = vec![
                    ("operation", operation),
                    ("batch", batch_num.as_str()),
                    ("error", error.as_str()),
                    ("response_body", e.response_body()),
                ];
                line_fields.extend_from_slice(fields);
                report.add_fields(
                    operation,
                    "failed to execute paginated API call",
                    &line_fields,
                );
            }
        }
    }

    info!(operation, count = results.len(), "retrieved paginated results");
    results
}
