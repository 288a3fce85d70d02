use crate::foundation::error::V2dError;

/// Reserve room for `additional` more elements, or abort the process.
///
/// A job whose task list cannot grow is never submitted half-built.
pub(crate) fn reserve_or_abort<T>(v: &mut Vec<T>, additional: usize, what: &str) {
    if v.try_reserve(additional).is_err() {
        fatal_alloc_failure(what);
    }
}

#[cold]
pub(crate) fn fatal_alloc_failure(what: &str) -> ! {
    let err = V2dError::allocation_failure(format!("cannot allocate {what}"));
    tracing::error!(%err, "aborting: task storage exhausted");
    eprintln!("v2d: {err}; aborting");
    std::process::abort()
}
