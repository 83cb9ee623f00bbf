pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod form;
pub mod identity;
pub mod login;
pub mod navigation;
pub mod router;
pub mod storage;

// Debug printing helper: expands to eprintln! in test and debug builds, a no-op in release.
// Usage in tests: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In non-test builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
