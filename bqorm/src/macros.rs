//! Shorthands for building [`crate::error::OrmError`] values.

/// Creates an [`crate::error::OrmError`] from a kind and a static description, optionally
/// followed by a detail message and a `source:` error.
#[macro_export]
macro_rules! orm_error {
    ($kind:expr, $desc:expr $(,)?) => {
        $crate::error::OrmError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr $(,)?) => {
        $crate::error::OrmError::from(($kind, $desc, $detail.to_string()))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr $(,)?) => {
        $crate::orm_error!($kind, $desc, $detail).with_source($source)
    };
}

/// Returns early with the error [`orm_error!`] builds from the same arguments.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)+) => {
        return ::core::result::Result::Err($crate::orm_error!($($arg)+))
    };
}
