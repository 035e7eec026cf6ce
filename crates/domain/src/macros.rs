//! Macro for implementing Display and FromStr for wire status enums
//!
//! The marketplace reports statuses as upper-case tokens (`ACTIVE`,
//! `IN_PROGRESS`, ...). The macro maps each variant to its token once and
//! derives both conversions from that table.
//!
//! # Example
//!
//! ```rust
//! use stockx_domain::impl_wire_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum ShipmentStatus {
//!     Pending,
//!     Shipped,
//! }
//!
//! impl_wire_status_conversions!(ShipmentStatus {
//!     Pending => "PENDING",
//!     Shipped => "SHIPPED",
//! });
//!
//! assert_eq!(ShipmentStatus::Shipped.to_string(), "SHIPPED");
//! assert_eq!("pending".parse::<ShipmentStatus>(), Ok(ShipmentStatus::Pending));
//! ```

/// Implements `Display` (wire token) and case-insensitive `FromStr` for a
/// status enum.
#[macro_export]
macro_rules! impl_wire_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Wire token for this status
            pub fn as_wire_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_wire_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($str) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}
