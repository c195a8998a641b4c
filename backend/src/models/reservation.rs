use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::reservations;

text_enum!(
    ReservationStatus {
        Pending => "pending",
        Active => "active",
        Cancelled => "cancelled",
        Completed => "completed",
    }
);

text_enum!(
    /// Recorded with the booking; every reservation still spans one day.
    ReservationType {
        Daily => "daily",
        Monthly => "monthly",
        Viewing => "viewing",
    }
);

impl ReservationStatus {
    /// Statuses that hold a claim on the property.
    pub const HOLDING: [ReservationStatus; 2] = [ReservationStatus::Pending, ReservationStatus::Active];

    pub fn holds_property(self) -> bool {
        Self::HOLDING.contains(&self)
    }

    pub fn can_become(self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Active) | (Pending, Cancelled) | (Active, Completed) | (Active, Cancelled)
        )
    }

    pub fn holding_strs() -> [&'static str; 2] {
        Self::HOLDING.map(ReservationStatus::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = reservations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Reservation {
    pub id: i32,
    pub property_id: i32,
    pub tenant_id: i32,
    pub owner_id: i32,
    pub status: String,
    pub reservation_type: String,
    pub reference: String,
    pub starts_at: NaiveDateTime,
    pub ends_at: Option<NaiveDateTime>,
    pub notes: Option<String>,
    pub tenant_confirmed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = reservations)]
pub struct NewReservation<'a> {
    pub property_id: i32,
    pub tenant_id: i32,
    pub owner_id: i32,
    pub status: &'a str,
    pub reservation_type: &'a str,
    pub reference: &'a str,
    pub starts_at: NaiveDateTime,
    pub ends_at: Option<NaiveDateTime>,
    pub notes: Option<&'a str>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Reservation {
    pub fn status(&self) -> Result<ReservationStatus, super::UnknownValue> {
        self.status.parse()
    }

    /// Whether the owner of the reservation (or an admin) may manage it.
    pub fn is_managed_by(&self, user_id: i32) -> bool {
        self.owner_id == user_id
    }
}

pub fn find(conn: &mut SqliteConnection, reservation_id: i32) -> QueryResult<Option<Reservation>> {
    reservations::table
        .find(reservation_id)
        .select(Reservation::as_select())
        .first(conn)
        .optional()
}
