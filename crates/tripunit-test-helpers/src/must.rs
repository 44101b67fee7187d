//! Unwrap helper with a good error message.
//!
//! Replaces `expect()` on options in test code and reports the caller's
//! location through `#[track_caller]`.

/// Unwrap an `Option`, panicking with `msg` if `None`.
///
/// ```rust
/// use tripunit_test_helpers::must_some;
///
/// assert_eq!(must_some(Some(42), "expected a value"), 42);
/// ```
///
/// # Panics
///
/// Panics if the option is `None`.
#[track_caller]
pub fn must_some<T>(option: Option<T>, msg: &str) -> T {
    match option {
        Some(v) => v,
        None => panic!("must_some: {msg}"),
    }
}
