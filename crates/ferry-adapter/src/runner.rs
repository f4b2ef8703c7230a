//! Bounded concurrent runner.
//!
//! Runs one future per input with at most `concurrency` in flight. Results
//! land in a slot array indexed by input position, so the output order
//! matches the input order whatever the completion order was.

use std::future::Future;

use futures::stream::{self, StreamExt};

/// Runs `task` over every input with bounded concurrency.
///
/// The first error aborts the run; in-flight futures are dropped.
///
/// # Errors
///
/// Returns the first error produced by `task`.
pub async fn run_bounded<I, T, E, F, Fut>(
    inputs: Vec<I>,
    concurrency: usize,
    task: F,
) -> Result<Vec<T>, E>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(inputs.len()).collect();

    let mut results = stream::iter(inputs.into_iter().enumerate().map(|(index, input)| {
        let fut = task(input);
        async move { (index, fut.await) }
    }))
    .buffer_unordered(concurrency.max(1));

    while let Some((index, result)) = results.next().await {
        slots[index] = Some(result?);
    }

    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_order_is_input_order() {
        // Later inputs finish first.
        let inputs: Vec<u64> = (0..8).collect();
        let out = run_bounded(inputs, 4, |i| async move {
            tokio::time::sleep(Duration::from_millis(40 - i * 5)).await;
            Ok::<_, String>(i * 10)
        })
        .await
        .unwrap();
        assert_eq!(out, vec![0, 10, 20, 30, 40, 50, 60, 70]);
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let out = run_bounded((0..20).collect::<Vec<u32>>(), 3, |i| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, String>(i)
            }
        })
        .await
        .unwrap();

        assert_eq!(out.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_first_error_aborts() {
        let result = run_bounded(vec![1, 2, 3], 1, |i| async move {
            if i == 2 {
                Err(format!("failed on {i}"))
            } else {
                Ok(i)
            }
        })
        .await;
        assert_eq!(result.unwrap_err(), "failed on 2");
    }

    #[tokio::test]
    async fn test_empty_input() {
        let out = run_bounded(Vec::<u8>::new(), 0, |i| async move { Ok::<_, ()>(i) })
            .await
            .unwrap();
        assert!(out.is_empty());
    }
}
