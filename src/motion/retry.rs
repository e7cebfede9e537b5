// src/motion/retry.rs - Bounded retry loop shared by the batch smoothers

/// Result of a bounded retry loop
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome<T> {
    /// Value produced by the last attempt
    pub value: T,
    /// Whether the last attempt passed the acceptance check
    pub accepted: bool,
    /// Number of attempts run, between 1 and the maximum
    pub attempts: usize,
}

/// Run `attempt` until `accept` approves its value or `max_attempts` runs
/// are spent. The attempt closure receives the zero-based attempt index.
/// Returns `None` only when `max_attempts` is zero.
pub fn retry<T>(
    max_attempts: usize,
    mut attempt: impl FnMut(usize) -> T,
    mut accept: impl FnMut(&T) -> bool,
) -> Option<RetryOutcome<T>> {
    let mut last = None;
    for index in 0..max_attempts {
        let value = attempt(index);
        let accepted = accept(&value);
        last = Some(RetryOutcome {
            value,
            accepted,
            attempts: index + 1,
        });
        if accepted {
            break;
        }
    }
    last
}

/// Like [`retry`], but an `Err` from an attempt aborts the loop at once.
pub fn try_retry<T, E>(
    max_attempts: usize,
    mut attempt: impl FnMut(usize) -> Result<T, E>,
    mut accept: impl FnMut(&T) -> bool,
) -> Result<Option<RetryOutcome<T>>, E> {
    let mut last = None;
    for index in 0..max_attempts {
        let value = attempt(index)?;
        let accepted = accept(&value);
        last = Some(RetryOutcome {
            value,
            accepted,
            attempts: index + 1,
        });
        if accepted {
            break;
        }
    }
    Ok(last)
}

/// Upper bound on the number of geometric de-rating steps needed to bring a
/// magnitude of `start` down to `floor` with the given `factor` in (0, 1).
pub fn derating_bound(start: f64, floor: f64, factor: f64) -> usize {
    if start <= floor || !(factor > 0.0 && factor < 1.0) || floor <= 0.0 {
        return 0;
    }
    ((floor / start).ln() / factor.ln()).ceil() as usize
}
