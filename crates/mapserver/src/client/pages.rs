//! Sequential page cursor over a paginated query.

use std::collections::HashSet;

use futures_core::Stream;
use tracing::{debug, warn};

use crate::client::MapServerClient;
use crate::error::{DecodeError, Result};
use crate::models::{FeatureSet, Query};
use crate::network::Transport;

/// Lazy sequence of query pages.
///
/// Each [`Pages::next_page`] issues exactly one request, continuing from the
/// previous page's `next_offset()`. Pages are never fetched ahead or out of
/// order. A failed page leaves the cursor where it was, so calling
/// `next_page` again re-requests the same offset.
pub struct Pages<'c, T> {
    client: &'c MapServerClient<T>,
    query: Query,
    start: u32,
    next: Option<u32>,
}

impl<'c, T: Transport> Pages<'c, T> {
    pub(crate) fn new(client: &'c MapServerClient<T>, query: Query) -> Self {
        let start = query.result_offset();
        Self {
            client,
            query,
            start,
            next: Some(start),
        }
    }

    /// Offset of the page the next call will request, `None` once done.
    pub fn next_offset(&self) -> Option<u32> {
        self.next
    }

    pub fn is_done(&self) -> bool {
        self.next.is_none()
    }

    /// Rewind to the query's original offset.
    pub fn restart(&mut self) {
        self.next = Some(self.start);
    }

    pub async fn next_page(&mut self) -> Option<Result<FeatureSet>> {
        let offset = self.next?;
        let query = self.query.clone().with_offset(offset);

        match self.client.query(&query).await {
            Ok(page) => {
                self.next = page.next_offset();
                Some(Ok(page))
            }
            Err(error) => Some(Err(error)),
        }
    }

    /// Adapt to a `Stream` that ends after the last page or the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<FeatureSet>> + 'c {
        futures_util::stream::unfold(Some(self), |state| async move {
            let mut pages = state?;
            match pages.next_page().await? {
                Ok(page) => Some((Ok(page), Some(pages))),
                Err(error) => Some((Err(error), None)),
            }
        })
    }

    /// Drain the remaining pages into one set, in page order.
    ///
    /// Features whose object id was already seen on an earlier page are
    /// skipped, so a server reshuffling rows between pages cannot produce
    /// duplicates.
    ///
    /// A truncated page that adds nothing new means the server ignores
    /// `resultOffset`; that is a [`DecodeError::Schema`] rather than an
    /// endless walk of offsets.
    pub async fn collect_all(mut self) -> Result<FeatureSet> {
        let offset = self.next.unwrap_or(self.start);
        let mut features = Vec::new();
        let mut seen = HashSet::new();
        let mut metadata = None;
        let mut page_count = 0usize;
        let mut previous: Option<FeatureSet> = None;

        while let Some(page) = self.next_page().await {
            let page = page?;
            page_count += 1;

            let id_field = page.object_id_field().map(str::to_string);
            if metadata.is_none() {
                metadata = Some((page.geometry_type(), page.spatial_reference(), id_field.clone()));
            }

            // Without object ids, a page identical to the last one is the
            // only sign of a stuck offset.
            let repeated = id_field.is_none()
                && previous
                    .as_ref()
                    .is_some_and(|last| last.features() == page.features());
            let truncated = page.exceeded_transfer_limit() && !page.is_empty();
            let before = features.len();
            if id_field.is_none() && truncated {
                previous = Some(page.clone());
            }

            for feature in page {
                let id = id_field.as_deref().and_then(|field| feature.object_id(field));
                if id.is_none_or(|id| seen.insert(id)) {
                    features.push(feature);
                }
            }

            if truncated && (repeated || features.len() == before) {
                warn!(
                    layer = %self.query.layer_id(),
                    pages = page_count,
                    "MapServer page added no new features, resultOffset is ignored"
                );
                return Err(DecodeError::Schema(format!(
                    "server ignored resultOffset on layer {}",
                    self.query.layer_id()
                ))
                .into());
            }
        }

        debug!(
            layer = %self.query.layer_id(),
            pages = page_count,
            features = features.len(),
            "Merged MapServer query pages"
        );

        let (geometry_type, spatial_reference, object_id_field) =
            metadata.unwrap_or((self.query.expected_geometry(), None, None));

        Ok(FeatureSet::from_parts(
            features,
            false,
            geometry_type,
            spatial_reference,
            object_id_field,
            offset,
        ))
    }
}
