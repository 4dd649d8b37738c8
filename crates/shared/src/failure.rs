use core::fmt::Display;

use tracing::error;

#[track_caller]
fn log_and_panic<Err: Display>(error: Err, message: &str) -> ! {
    error!("{message}: {error}");

    panic!("{message}: {error}");
}

/// Extension trait for results that cannot be recovered from at startup.
pub trait Failure<T> {
    /// Log the error then panic.
    fn or_log_and_panic(self, message: &str) -> T;
}

impl<T, E: Display> Failure<T> for Result<T, E> {
    #[track_caller]
    fn or_log_and_panic(self, message: &str) -> T {
        match self {
            Ok(value) => value,
            Err(error) => log_and_panic(error, message),
        }
    }
}
