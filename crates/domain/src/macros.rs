//! Macro for implementing Display and FromStr for wire-name enums
//!
//! Provider kinds and token origins are stored and configured as lowercase
//! strings. This macro keeps both directions of the mapping in one place.
//!
//! # Example
//!
//! ```rust
//! use schej_domain::impl_wire_name_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Channel {
//!     Email,
//!     Push,
//! }
//!
//! impl_wire_name_conversions!(Channel {
//!     Email => "email",
//!     Push => "push",
//! });
//!
//! assert_eq!(Channel::Push.to_string(), "push");
//! assert_eq!("EMAIL".parse::<Channel>(), Ok(Channel::Email));
//! ```

/// Implements Display and case-insensitive FromStr for a fieldless enum
#[macro_export]
macro_rules! impl_wire_name_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl $enum_name {
            /// Stable lowercase name used in storage and configuration
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
