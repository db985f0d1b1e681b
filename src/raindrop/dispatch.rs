use super::{BatchResponse, BookmarkApi, BookmarkPayload, RaindropError};

/// Largest number of items sent in one create call.
pub const BATCH_SIZE: usize = 100;

/// Sends `payloads` in order, [`BATCH_SIZE`] at a time, one call after another.
///
/// Returns one response per batch, aligned with `payloads.chunks(BATCH_SIZE)`.
/// Item-level results are passed back untouched. The first transport failure
/// stops the submission and is returned; batches already sent stay sent.
pub async fn submit<A>(
    api: &A,
    payloads: &[BookmarkPayload],
) -> Result<Vec<BatchResponse>, RaindropError>
where
    A: BookmarkApi + ?Sized,
{
    let total_batches = payloads.len().div_ceil(BATCH_SIZE);
    let mut responses = Vec::with_capacity(total_batches);

    for (index, batch) in payloads.chunks(BATCH_SIZE).enumerate() {
        tracing::debug!(
            batch = index + 1,
            of = total_batches,
            items = batch.len(),
            "Submitting batch"
        );
        let response = api.create_raindrops(batch).await.map_err(|e| {
            tracing::warn!(
                batch = index + 1,
                of = total_batches,
                error = %e,
                "Batch submission failed"
            );
            e
        })?;
        responses.push(response);
    }

    Ok(responses)
}
