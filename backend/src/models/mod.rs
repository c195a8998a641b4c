//! Row structs for every table plus the closed vocabularies stored in text
//! columns. Enum values are stored lowercase; parsing is case-insensitive.

use serde::Serialize;

/// Declares a text-backed enum with `as_str`, `FromStr` and serde support.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case", try_from = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::UnknownValue;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let folded = value.trim().to_ascii_lowercase();
                match folded.as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err($crate::models::UnknownValue {
                        kind: stringify!($name),
                        value: value.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::models::UnknownValue;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

pub mod invoice;
pub mod property;
pub mod reservation;
pub mod ticket;
pub mod user;

pub use invoice::{Invoice, InvoiceStatus, NewInvoice};
pub use property::{NewProperty, Property, PropertyStatus};
pub use reservation::{NewReservation, Reservation, ReservationStatus, ReservationType};
pub use ticket::{NewTicket, Ticket, TicketCategory, TicketPriority, TicketStatus};
pub use user::{NewUser, OwnerProfile, Profile, Role, TenantProfile, TenantStatus, User, UserRow};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value {value:?}")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

impl From<UnknownValue> for crate::error::AppError {
    fn from(err: UnknownValue) -> Self {
        // A stored value outside its CHECK constraint means the row is corrupt.
        crate::error::AppError::Internal(err.to_string())
    }
}

/// One page of a listing.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[serde(default)]
pub struct PageParams {
    pub page: i64,
    pub per_page: i64,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 15,
        }
    }
}

impl PageParams {
    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, 100),
        }
    }

    /// Rows to skip; saturates so an absurd page number reads as past the end.
    pub fn offset(self) -> i64 {
        self.page.saturating_sub(1).max(0).saturating_mul(self.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_parsing_folds_case() {
        assert_eq!("Owner".parse::<Role>(), Ok(Role::Owner));
        assert_eq!(" TENANT ".parse::<Role>(), Ok(Role::Tenant));
        assert!("landlord".parse::<Role>().is_err());
        assert_eq!(Role::Admin.as_str(), "admin");
        assert_eq!(
            "in_progress".parse::<TicketStatus>(),
            Ok(TicketStatus::InProgress)
        );
    }

    #[test]
    fn page_params_are_clamped() {
        let params = PageParams { page: 0, per_page: 500 }.clamped();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
        assert_eq!(PageParams { page: 3, per_page: 10 }.offset(), 20);
    }

    #[test]
    fn huge_page_numbers_saturate_instead_of_overflowing() {
        let params = PageParams { page: i64::MAX, per_page: 100 }.clamped();
        assert_eq!(params.offset(), i64::MAX);
        assert_eq!(PageParams { page: i64::MIN, per_page: 100 }.offset(), 0);
    }
}
