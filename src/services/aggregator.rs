use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::clients::{UserDataClient, UserDataError};
use crate::domain::{UserId, UserRecord};

/// Fetches many users in fixed-size chunks.
///
/// All users of one chunk are fetched concurrently; chunks run strictly one
/// after another with `after_chunk_delay` between them, which caps the number
/// of in-flight upstream calls at `chunk_size * 4`.
#[derive(Clone)]
pub struct UserAggregator {
    client: Arc<dyn UserDataClient>,
    chunk_size: usize,
    after_chunk_delay: Duration,
}

impl UserAggregator {
    pub fn new(
        client: Arc<dyn UserDataClient>,
        chunk_size: usize,
        after_chunk_delay: Duration,
    ) -> Self {
        Self {
            client,
            chunk_size: chunk_size.max(1),
            after_chunk_delay,
        }
    }

    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns one record per id, in input order.
    ///
    /// The first hard error aborts the whole aggregation; no partial result
    /// is returned.
    pub async fn fetch_all(&self, ids: &[UserId]) -> Result<Vec<UserRecord>, UserDataError> {
        let total_chunks = ids.len().div_ceil(self.chunk_size);
        let mut records = Vec::with_capacity(ids.len());

        for (index, chunk) in ids.chunks(self.chunk_size).enumerate() {
            if index > 0 && !self.after_chunk_delay.is_zero() {
                tokio::time::sleep(self.after_chunk_delay).await;
            }

            debug!(
                chunk = index + 1,
                total_chunks,
                users = chunk.len(),
                "Fetching user chunk"
            );

            let fetched =
                try_join_all(chunk.iter().map(|id| self.client.fetch_user(id))).await?;
            records.extend(fetched);
        }

        Ok(records)
    }
}
