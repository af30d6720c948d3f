use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// One candidate that did not succeed, kept for the final diagnostic.
#[derive(Debug, Clone)]
pub struct Failure<E> {
    pub candidate: String,
    pub error: E,
}

/// Tries `candidates` in order until `attempt` returns `Ok`.
///
/// Sleeps `delay` between a failed attempt and the next one, never after the
/// last. Returns the index of the winning candidate together with its value,
/// or every failure in candidate order once the list is exhausted. Each
/// candidate is attempted at most once.
pub async fn first_success<'a, C, T, E, F, Fut>(
    candidates: &'a [C],
    delay: Duration,
    mut attempt: F,
) -> Result<(usize, T), Vec<Failure<E>>>
where
    C: Display,
    E: Display,
    F: FnMut(&'a C) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut failures = Vec::with_capacity(candidates.len());

    for (index, candidate) in candidates.iter().enumerate() {
        match attempt(candidate).await {
            Ok(value) => return Ok((index, value)),
            Err(error) => {
                tracing::warn!(candidate = %candidate, error = %error, "attempt failed, falling back");
                failures.push(Failure {
                    candidate: candidate.to_string(),
                    error,
                });
                if index + 1 < candidates.len() && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(failures)
}

/// Renders the failures as `a: reason; b: reason` for error messages.
pub fn describe_failures<E: Display>(failures: &[Failure<E>]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.candidate, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}
