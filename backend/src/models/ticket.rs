use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::tickets;

text_enum!(
    TicketCategory {
        Maintenance => "maintenance",
        Plumbing => "plumbing",
        Electrical => "electrical",
        Cleaning => "cleaning",
        Security => "security",
        Concierge => "concierge",
        Other => "other",
    }
);

text_enum!(
    TicketPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
);

text_enum!(
    TicketStatus {
        Open => "open",
        InProgress => "in_progress",
        Resolved => "resolved",
        Closed => "closed",
    }
);

impl TicketStatus {
    pub fn is_closed(self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }

    /// New `resolved_at` after moving from `self` to `next`.
    pub fn resolved_at_after(
        self,
        next: TicketStatus,
        current: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> Option<NaiveDateTime> {
        match (self.is_closed(), next.is_closed()) {
            (false, true) => Some(now),
            (true, false) => None,
            _ => current,
        }
    }
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = tickets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Ticket {
    pub id: i32,
    pub tenant_id: i32,
    pub property_id: Option<i32>,
    pub subject: String,
    pub description: String,
    pub category: String,
    pub priority: String,
    pub status: String,
    pub resolved_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tickets)]
pub struct NewTicket {
    pub tenant_id: i32,
    pub property_id: Option<i32>,
    pub subject: String,
    pub description: String,
    pub category: String,
    pub priority: String,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
