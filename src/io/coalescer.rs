//! Batches byte range requests against one resource into as few fetches as possible.
//!
//! Requests are queued together with a oneshot sender. A flush takes the whole queue, sorts it by
//! start offset and merges neighbouring ranges in a single sweep whenever the next range starts
//! within [`COALESCE_THRESHOLD`] bytes of the current range's end. Every request is then served as
//! a sub-slice of exactly one fetched range. Requests queued while a flush is in flight end up in
//! the next batch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures::future::join_all;
use log::{error, trace};
use tokio::sync::oneshot;

use crate::assets::error::AssetError;
use crate::io::common::loader::{ByteRange, DataFetcher};

/// Gaps up to this size are fetched along instead of issuing another request.
pub const COALESCE_THRESHOLD: u64 = 16;

struct PendingRangeRequest {
    range: ByteRange,
    sender: oneshot::Sender<Result<Bytes, AssetError>>,
}

pub struct RangeCoalescer {
    fetcher: Arc<dyn DataFetcher>,
    path: String,
    pending: Mutex<Vec<PendingRangeRequest>>,
    flushes: AtomicUsize,
}

impl RangeCoalescer {
    pub fn new(fetcher: Arc<dyn DataFetcher>, path: impl Into<String>) -> Self {
        RangeCoalescer {
            fetcher,
            path: path.into(),
            pending: Mutex::new(Vec::new()),
            flushes: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of flushes that actually issued fetches.
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Queues a request and resolves it with the next flush. The task yields once before
    /// flushing, so requests issued in the same scheduler turn share one batch.
    pub async fn request(&self, start: u64, size: u64) -> Result<Bytes, AssetError> {
        let (sender, receiver) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PendingRangeRequest {
                range: ByteRange::new(start, size),
                sender,
            });

        tokio::task::yield_now().await;
        self.flush().await;

        receiver
            .await
            .map_err(|_| AssetError::PendingRequestDropped)?
    }

    /// Drains the queue and resolves every drained request. A no-op on an empty queue.
    pub async fn flush(&self) {
        let mut batch = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *pending)
        };
        if batch.is_empty() {
            return;
        }

        batch.sort_by_key(|request| request.range.start);
        let ranges = coalesce(batch.iter().map(|request| request.range));
        self.flushes.fetch_add(1, Ordering::SeqCst);
        trace!(
            "{}: flushing {} requests as {} fetches",
            self.path,
            batch.len(),
            ranges.len()
        );

        let results = join_all(
            ranges
                .iter()
                .map(|range| self.fetcher.fetch(&self.path, Some(*range))),
        )
        .await;

        let fetched = ranges.into_iter().zip(results).collect::<Vec<_>>();
        distribute(&self.path, batch, &fetched);
    }
}

/// Merges ranges into a minimal set of fetches in one left to right sweep. The input has to be
/// sorted by start offset.
pub fn coalesce(ranges: impl IntoIterator<Item = ByteRange>) -> Vec<ByteRange> {
    let mut merged: Vec<ByteRange> = Vec::new();
    for range in ranges {
        match merged.last_mut() {
            Some(current) if range.start <= current.end() + COALESCE_THRESHOLD => {
                let end = current.end().max(range.end());
                current.size = end - current.start;
            }
            _ => merged.push(range),
        }
    }
    merged
}

fn distribute(
    path: &str,
    batch: Vec<PendingRangeRequest>,
    fetched: &[(ByteRange, Result<Bytes, AssetError>)],
) {
    for request in batch {
        let covering = fetched
            .iter()
            .find(|(range, _)| range.contains(&request.range));

        let outcome = match covering {
            None => {
                error!("{}: no fetched range covers {:?}", path, request.range);
                Err(AssetError::InvariantViolation(format!(
                    "no fetched range of {} covers {:?}",
                    path, request.range
                )))
            }
            Some((_, Err(e))) => Err(e.clone()),
            Some((range, Ok(bytes))) => {
                let local = (request.range.start - range.start) as usize;
                let end = local + request.range.size as usize;
                if end > bytes.len() {
                    Err(AssetError::Fetch {
                        path: path.to_string(),
                        reason: format!(
                            "short read, {:?} ends past the {} bytes returned",
                            request.range,
                            bytes.len()
                        ),
                    })
                } else {
                    Ok(bytes.slice(local..end))
                }
            }
        };

        // The waiter may have gone away, nothing to resolve then.
        let _ = request.sender.send(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::common::loader::MemoryDataFetcher;

    fn ranges(values: &[(u64, u64)]) -> Vec<ByteRange> {
        values
            .iter()
            .map(|(start, size)| ByteRange::new(*start, *size))
            .collect()
    }

    #[test]
    fn merges_within_threshold() {
        let merged = coalesce(ranges(&[(0, 10), (12, 5), (100, 20)]));
        assert_eq!(merged, ranges(&[(0, 17), (100, 20)]));
    }

    #[test]
    fn merges_overlapping_and_contained() {
        assert_eq!(coalesce(ranges(&[(0, 10), (4, 2), (26, 4)])), ranges(&[(0, 30)]));
        assert_eq!(coalesce(ranges(&[(0, 10), (27, 4)])), ranges(&[(0, 10), (27, 4)]));
        assert!(coalesce(Vec::new()).is_empty());
    }

    fn payload() -> Arc<MemoryDataFetcher> {
        let fetcher = Arc::new(MemoryDataFetcher::new());
        fetcher.insert("blob", (0..=255u8).collect::<Vec<_>>());
        fetcher
    }

    #[tokio::test]
    async fn concurrent_requests_share_a_batch() -> Result<(), anyhow::Error> {
        let fetcher = payload();
        let coalescer = RangeCoalescer::new(fetcher.clone(), "blob");

        let (a, b, c) = tokio::join!(
            coalescer.request(0, 10),
            coalescer.request(12, 5),
            coalescer.request(100, 20)
        );

        assert_eq!(&a?[..], &(0..10u8).collect::<Vec<_>>()[..]);
        assert_eq!(&b?[..], &(12..17u8).collect::<Vec<_>>()[..]);
        assert_eq!(&c?[..], &(100..120u8).collect::<Vec<_>>()[..]);
        assert_eq!(
            fetcher.requests_for("blob"),
            vec![Some(ByteRange::new(0, 17)), Some(ByteRange::new(100, 20))]
        );
        assert_eq!(coalescer.flush_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn failed_fetch_fails_every_request() {
        let fetcher = Arc::new(MemoryDataFetcher::new());
        let coalescer = RangeCoalescer::new(fetcher.clone(), "missing");

        let (a, b) = tokio::join!(coalescer.request(0, 4), coalescer.request(8, 4));
        assert!(matches!(a, Err(AssetError::Fetch { .. })));
        assert!(matches!(b, Err(AssetError::Fetch { .. })));
        assert_eq!(fetcher.fetch_count(), 1);
    }

    #[tokio::test]
    async fn uncovered_request_is_an_invariant_violation() {
        let (sender, receiver) = oneshot::channel();
        let batch = vec![PendingRangeRequest {
            range: ByteRange::new(50, 10),
            sender,
        }];
        let fetched = vec![(ByteRange::new(0, 20), Ok(Bytes::from(vec![0u8; 20])))];

        distribute("blob", batch, &fetched);
        assert!(matches!(
            receiver.await,
            Ok(Err(AssetError::InvariantViolation(_)))
        ));
    }

    #[tokio::test]
    async fn flush_on_empty_queue_does_nothing() {
        let fetcher = payload();
        let coalescer = RangeCoalescer::new(fetcher.clone(), "blob");
        coalescer.flush().await;
        assert_eq!(fetcher.fetch_count(), 0);
        assert_eq!(coalescer.flush_count(), 0);
    }
}
