//! Bounded ordered fan-out
//!
//! Nested resolvers fan out one REST call per item: a network lookup per
//! network id on a machine, a machine re-fetch per listed machine. This
//! runs those calls with a configurable concurrency bound while keeping the
//! output in input-index order.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;

/// Apply `f` to every item with at most `limit` calls in flight. The output
/// order mirrors the input order regardless of completion order.
pub async fn try_map_ordered<I, T, U, E, F, Fut>(items: I, limit: usize, f: F) -> Result<Vec<U>, E>
where
    I: IntoIterator<Item = T>,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<U, E>>,
{
    stream::iter(items.into_iter().map(f))
        .buffered(limit.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn preserves_input_order() {
        // later items finish first; output order must not change
        let result = try_map_ordered(vec![30u64, 20, 10], 3, |delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok::<_, ()>(delay)
        })
        .await
        .unwrap();

        assert_eq!(result, vec![30, 20, 10]);
    }

    #[tokio::test]
    async fn respects_the_concurrency_bound() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let result = try_map_ordered(0..16, 2, |i| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ()>(i)
            }
        })
        .await
        .unwrap();

        assert_eq!(result.len(), 16);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn propagates_the_first_error() {
        let result = try_map_ordered(vec![1, 2, 3], 1, |i| async move {
            if i == 2 {
                Err("boom")
            } else {
                Ok(i)
            }
        })
        .await;

        assert_eq!(result, Err("boom"));
    }

    #[tokio::test]
    async fn zero_bound_still_makes_progress() {
        let result = try_map_ordered(vec![1, 2], 0, |i| async move { Ok::<_, ()>(i * 2) })
            .await
            .unwrap();

        assert_eq!(result, vec![2, 4]);
    }
}
