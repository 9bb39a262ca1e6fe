// Per-function tracing through the `log` facade.
//
// `tracer!("fn_name")` defines a local `t!` macro that prefixes every
// message with the function name and emits it at trace level.
macro_rules! tracer {
    ( $func:expr ) => {
        // Rust doesn't support $( ... ) in a nested macro's
        // definition, hence the enumeration.
        #[allow(unused_macros)]
        macro_rules! t {
            ( $fmt:expr ) =>
            { log::trace!("{}: {}", $func, $fmt) };
            ( $fmt:expr, $a:expr ) =>
            { log::trace!("{}: {}", $func, format!($fmt, $a)) };
            ( $fmt:expr, $a:expr, $b:expr ) =>
            { log::trace!("{}: {}", $func, format!($fmt, $a, $b)) };
            ( $fmt:expr, $a:expr, $b:expr, $c:expr ) =>
            { log::trace!("{}: {}", $func, format!($fmt, $a, $b, $c)) };
            ( $fmt:expr, $a:expr, $b:expr, $c:expr, $d:expr ) =>
            { log::trace!("{}: {}", $func, format!($fmt, $a, $b, $c, $d)) };
            ( $fmt:expr, $a:expr, $b:expr, $c:expr, $d:expr, $e:expr ) =>
            { log::trace!("{}: {}", $func, format!($fmt, $a, $b, $c, $d, $e)) };
        }
    }
}

// Builds a `BadData` error with a formatted message.
macro_rules! bad_data {
    ( $($arg:tt)* ) => {
        anyhow::Error::from(crate::Error::BadData(format!($($arg)*)))
    };
}
