//! Optimistic local mutations.

use std::future::Future;

/// Apply `delta` locally, await `request`, and apply `-delta` if it fails.
///
/// `adjust` is called once with `delta` before the request is polled and, on
/// failure, once more with the exact inverse. The request's error is returned
/// unchanged.
pub async fn mutate<T, E, Fut>(delta: i64, mut adjust: impl FnMut(i64), request: Fut) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    adjust(delta);
    match request.await {
        Ok(value) => Ok(value),
        Err(e) => {
            adjust(-delta);
            Err(e)
        }
    }
}
