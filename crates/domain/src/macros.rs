//! Display/FromStr boilerplate for the small status enums in this crate.
//!
//! # Example
//!
//! ```rust
//! use dbarchive_domain::impl_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Phase {
//!     Counting,
//!     Moving,
//! }
//!
//! impl_status_conversions!(Phase {
//!     Counting => "counting",
//!     Moving => "moving",
//! });
//!
//! assert_eq!(Phase::Moving.to_string(), "moving");
//! assert_eq!("COUNTING".parse::<Phase>(), Ok(Phase::Counting));
//! ```

/// Implements `Display` (lowercase label) and case-insensitive `FromStr` for
/// a fieldless enum.
#[macro_export]
macro_rules! impl_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
