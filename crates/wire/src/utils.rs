//! Utility macros used internally by the wire crate.

/// Early-returns `Err($error)` when `$predicate` does not hold.
///
/// Works like `assert!`, but surfaces a typed error to the caller instead of
/// panicking, which keeps validation of untrusted wire input panic free.
///
/// # Example
///
/// ```ignore
/// ensure!(headers.len() < MAX_HEADERS, ParseError::TooManyHeaders);
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
