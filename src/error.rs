// Nothing in the core is allowed to be fatal. Invariant violations are formatted with
// `internal_error_message!` and logged; the view then waits for the next snapshot.

#[macro_export]
macro_rules! internal_error_message {
    () => {
        format!("Internal error at {}:{}.", file!(), line!())
    };
    ($($arg:tt)+) => {
        format!("Internal error at {}:{}: {}.", file!(), line!(), format!($($arg)*))
    };
}
