//! Shared error classification.
//!
//! Every component error exposes a stable machine-readable code and whether
//! repeating the same operation could plausibly succeed. The conversation
//! store logs both when it folds a failure into history.

pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
