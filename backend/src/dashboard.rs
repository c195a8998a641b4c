//! Role dashboards: window-over-window counts and sums, recomputed on every
//! request from a single captured `now`.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use diesel::dsl::{count_distinct, count_star, sql};
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use serde::Serialize;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{PropertyStatus, ReservationStatus, Role, TicketStatus};
use crate::schema::{invoices, properties, reservations, tickets, users};

const EPSILON: f64 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl Trend {
    pub fn between(current: f64, previous: f64) -> Self {
        if current > previous {
            Trend::Up
        } else if current < previous {
            Trend::Down
        } else {
            Trend::Neutral
        }
    }
}

/// Signed difference, "0" when it is within rounding noise.
pub fn format_delta(difference: f64) -> String {
    if difference.abs() < EPSILON {
        "0".to_string()
    } else if (difference - difference.round()).abs() < EPSILON {
        format!("{:+.0}", difference.round())
    } else {
        format!("{:+.2}", difference)
    }
}

pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous.abs() < EPSILON {
        if current.abs() < EPSILON {
            0.0
        } else {
            100.0_f64.copysign(current)
        }
    } else {
        (current - previous) / previous.abs() * 100.0
    }
}

pub fn format_percent(percent: f64) -> String {
    if percent.abs() < EPSILON {
        return "0%".to_string();
    }
    let rounded = (percent * 10.0).round() / 10.0;
    if rounded.abs() < EPSILON {
        "0%".to_string()
    } else if (rounded - rounded.round()).abs() < EPSILON {
        format!("{:+.0}%", rounded)
    } else {
        format!("{:+.1}%", rounded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub current: i64,
    pub previous: i64,
    pub trend: Trend,
    pub delta: String,
    pub percent: String,
}

impl Metric {
    pub fn compare(current: i64, previous: i64) -> Self {
        let (cur, prev) = (current as f64, previous as f64);
        Self {
            current,
            previous,
            trend: Trend::between(cur, prev),
            delta: format_delta(cur - prev),
            percent: format_percent(percent_change(cur, prev)),
        }
    }
}

/// Half-open `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

fn month_start(year: i32, month: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn shift_month(year: i32, month: u32, by: i32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 + by;
    (index.div_euclid(12), (index.rem_euclid(12) + 1) as u32)
}

/// This calendar month and the one before it.
pub fn month_windows(now: NaiveDateTime) -> (Window, Window) {
    let (year, month) = (now.year(), now.month());
    let (prev_year, prev_month) = shift_month(year, month, -1);
    let (next_year, next_month) = shift_month(year, month, 1);
    let this_start = month_start(year, month);
    (
        Window {
            start: this_start,
            end: month_start(next_year, next_month),
        },
        Window {
            start: month_start(prev_year, prev_month),
            end: this_start,
        },
    )
}

/// The next seven days and the seven before now.
pub fn week_windows(now: NaiveDateTime) -> (Window, Window) {
    let week = Duration::days(7);
    (
        Window {
            start: now,
            end: now + week,
        },
        Window {
            start: now - week,
            end: now,
        },
    )
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    All,
    Owner(i32),
    Tenant(i32),
}

fn properties_created(conn: &mut SqliteConnection, scope: Scope, window: Window) -> QueryResult<i64> {
    let mut query = properties::table
        .filter(properties::deleted_at.is_null())
        .filter(properties::created_at.ge(window.start))
        .filter(properties::created_at.lt(window.end))
        .select(count_star())
        .into_boxed();
    if let Scope::Owner(owner_id) = scope {
        query = query.filter(properties::owner_id.eq(owner_id));
    }
    query.get_result(conn)
}

fn new_tenants(conn: &mut SqliteConnection, scope: Scope, window: Window) -> QueryResult<i64> {
    match scope {
        // Tenants that booked one of the owner's properties in the window.
        Scope::Owner(owner_id) => reservations::table
            .filter(reservations::owner_id.eq(owner_id))
            .filter(reservations::created_at.ge(window.start))
            .filter(reservations::created_at.lt(window.end))
            .select(count_distinct(reservations::tenant_id))
            .get_result(conn),
        _ => users::table
            .filter(users::role.eq(Role::Tenant.as_str()))
            .filter(users::created_at.ge(window.start))
            .filter(users::created_at.lt(window.end))
            .select(count_star())
            .get_result(conn),
    }
}

fn reservations_starting(conn: &mut SqliteConnection, scope: Scope, window: Window) -> QueryResult<i64> {
    let mut query = reservations::table
        .filter(reservations::status.ne(ReservationStatus::Cancelled.as_str()))
        .filter(reservations::starts_at.ge(window.start))
        .filter(reservations::starts_at.lt(window.end))
        .select(count_star())
        .into_boxed();
    match scope {
        Scope::All => {}
        Scope::Owner(owner_id) => query = query.filter(reservations::owner_id.eq(owner_id)),
        Scope::Tenant(tenant_id) => query = query.filter(reservations::tenant_id.eq(tenant_id)),
    }
    query.get_result(conn)
}

fn invoiced(conn: &mut SqliteConnection, scope: Scope, window: Window) -> QueryResult<i64> {
    let mut query = invoices::table
        .filter(invoices::created_at.ge(window.start))
        .filter(invoices::created_at.lt(window.end))
        .select(sql::<BigInt>("COALESCE(SUM(invoices.total), 0)"))
        .into_boxed();
    match scope {
        Scope::All => {}
        Scope::Owner(owner_id) => query = query.filter(invoices::owner_id.eq(owner_id)),
        Scope::Tenant(tenant_id) => query = query.filter(invoices::tenant_id.eq(tenant_id)),
    }
    query.get_result(conn)
}

fn invoices_issued(conn: &mut SqliteConnection, tenant_id: i32, window: Window) -> QueryResult<i64> {
    invoices::table
        .filter(invoices::tenant_id.eq(tenant_id))
        .filter(invoices::created_at.ge(window.start))
        .filter(invoices::created_at.lt(window.end))
        .select(count_star())
        .get_result(conn)
}

fn outstanding(conn: &mut SqliteConnection, scope: Scope) -> QueryResult<i64> {
    let mut query = invoices::table
        .filter(invoices::balance_due.gt(0))
        .select(sql::<BigInt>("COALESCE(SUM(invoices.balance_due), 0)"))
        .into_boxed();
    match scope {
        Scope::All => {}
        Scope::Owner(owner_id) => query = query.filter(invoices::owner_id.eq(owner_id)),
        Scope::Tenant(tenant_id) => query = query.filter(invoices::tenant_id.eq(tenant_id)),
    }
    query.get_result(conn)
}

fn open_tickets(conn: &mut SqliteConnection, scope: Scope) -> QueryResult<i64> {
    let open = [TicketStatus::Open.as_str(), TicketStatus::InProgress.as_str()];
    let mut query = tickets::table
        .filter(tickets::status.eq_any(open))
        .select(count_star())
        .into_boxed();
    match scope {
        Scope::All => {}
        Scope::Owner(owner_id) => {
            let owned = properties::table
                .filter(properties::owner_id.eq(owner_id))
                .select(properties::id.nullable());
            query = query.filter(tickets::property_id.eq_any(owned));
        }
        Scope::Tenant(tenant_id) => query = query.filter(tickets::tenant_id.eq(tenant_id)),
    }
    query.get_result(conn)
}

fn count_role(conn: &mut SqliteConnection, role: Role) -> QueryResult<i64> {
    users::table
        .filter(users::role.eq(role.as_str()))
        .select(count_star())
        .get_result(conn)
}

#[derive(Debug, Serialize)]
pub struct AdminTotals {
    pub properties: i64,
    pub owners: i64,
    pub tenants: i64,
    pub open_tickets: i64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    Admin {
        properties_created: Metric,
        new_tenants: Metric,
        upcoming_reservations: Metric,
        revenue: Metric,
        totals: AdminTotals,
    },
    Owner {
        properties_created: Metric,
        new_tenants: Metric,
        upcoming_reservations: Metric,
        revenue: Metric,
        occupied_properties: i64,
        outstanding_balance: i64,
        open_tickets: i64,
    },
    Tenant {
        upcoming_reservations: Metric,
        invoices_issued: Metric,
        outstanding_balance: i64,
        open_tickets: i64,
    },
}

pub fn build(
    conn: &mut SqliteConnection,
    viewer: &AuthUser,
    now: NaiveDateTime,
) -> Result<Dashboard, AppError> {
    let (this_month, last_month) = month_windows(now);
    let (next_week, past_week) = week_windows(now);

    let dashboard = match viewer.role {
        Role::Admin => {
            let scope = Scope::All;
            Dashboard::Admin {
                properties_created: Metric::compare(
                    properties_created(conn, scope, this_month)?,
                    properties_created(conn, scope, last_month)?,
                ),
                new_tenants: Metric::compare(
                    new_tenants(conn, scope, this_month)?,
                    new_tenants(conn, scope, last_month)?,
                ),
                upcoming_reservations: Metric::compare(
                    reservations_starting(conn, scope, next_week)?,
                    reservations_starting(conn, scope, past_week)?,
                ),
                revenue: Metric::compare(
                    invoiced(conn, scope, this_month)?,
                    invoiced(conn, scope, last_month)?,
                ),
                totals: AdminTotals {
                    properties: properties::table
                        .filter(properties::deleted_at.is_null())
                        .select(count_star())
                        .get_result(conn)?,
                    owners: count_role(conn, Role::Owner)?,
                    tenants: count_role(conn, Role::Tenant)?,
                    open_tickets: open_tickets(conn, scope)?,
                },
            }
        }
        Role::Owner => {
            let scope = Scope::Owner(viewer.id);
            Dashboard::Owner {
                properties_created: Metric::compare(
                    properties_created(conn, scope, this_month)?,
                    properties_created(conn, scope, last_month)?,
                ),
                new_tenants: Metric::compare(
                    new_tenants(conn, scope, this_month)?,
                    new_tenants(conn, scope, last_month)?,
                ),
                upcoming_reservations: Metric::compare(
                    reservations_starting(conn, scope, next_week)?,
                    reservations_starting(conn, scope, past_week)?,
                ),
                revenue: Metric::compare(
                    invoiced(conn, scope, this_month)?,
                    invoiced(conn, scope, last_month)?,
                ),
                occupied_properties: properties::table
                    .filter(properties::deleted_at.is_null())
                    .filter(properties::owner_id.eq(viewer.id))
                    .filter(properties::status.eq(PropertyStatus::Occupied.as_str()))
                    .select(count_star())
                    .get_result(conn)?,
                outstanding_balance: outstanding(conn, scope)?,
                open_tickets: open_tickets(conn, scope)?,
            }
        }
        Role::Tenant => {
            let scope = Scope::Tenant(viewer.id);
            Dashboard::Tenant {
                upcoming_reservations: Metric::compare(
                    reservations_starting(conn, scope, next_week)?,
                    reservations_starting(conn, scope, past_week)?,
                ),
                invoices_issued: Metric::compare(
                    invoices_issued(conn, viewer.id, this_month)?,
                    invoices_issued(conn, viewer.id, last_month)?,
                ),
                outstanding_balance: outstanding(conn, scope)?,
                open_tickets: open_tickets(conn, scope)?,
            }
        }
    };
    Ok(dashboard)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap()
    }

    #[test]
    fn trend_is_three_way() {
        assert_eq!(Trend::between(10.0, 5.0), Trend::Up);
        assert_eq!(Trend::between(5.0, 10.0), Trend::Down);
        assert_eq!(Trend::between(5.0, 5.0), Trend::Neutral);
    }

    #[test]
    fn tiny_differences_snap_to_zero() {
        assert_eq!(format_delta(0.00005), "0");
        assert_eq!(format_delta(-0.00009), "0");
        assert_eq!(format_delta(5.0), "+5");
        assert_eq!(format_delta(-3.0), "-3");
        assert_eq!(format_delta(2.5), "+2.50");
    }

    #[test]
    fn percent_change_guards_zero_baseline() {
        assert_eq!(percent_change(0.0, 0.0), 0.0);
        assert_eq!(percent_change(4.0, 0.0), 100.0);
        assert_eq!(percent_change(10.0, 5.0), 100.0);
        assert_eq!(format_percent(percent_change(5.0, 10.0)), "-50%");
        assert_eq!(format_percent(percent_change(4.0, 3.0)), "+33.3%");
        assert_eq!(format_percent(0.00001), "0%");
    }

    #[test]
    fn metric_combines_trend_and_formatting() {
        let metric = Metric::compare(10, 5);
        assert_eq!(metric.trend, Trend::Up);
        assert_eq!(metric.delta, "+5");
        assert_eq!(metric.percent, "+100%");
        assert_eq!(Metric::compare(5, 5).delta, "0");
        assert_eq!(Metric::compare(5, 5).percent, "0%");
    }

    #[test]
    fn month_windows_wrap_over_new_year() {
        let (this, last) = month_windows(at(2024, 1, 20));
        assert_eq!(this.start, at(2024, 1, 1).date().and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(this.end, at(2024, 2, 1).date().and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(last.start, at(2023, 12, 1).date().and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(last.end, this.start);

        let (december, _) = month_windows(at(2023, 12, 5));
        assert_eq!(december.end, at(2024, 1, 1).date().and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn week_windows_meet_at_now() {
        let now = at(2024, 6, 10);
        let (next, prior) = week_windows(now);
        assert_eq!(next.start, now);
        assert_eq!(prior.end, now);
        assert_eq!(next.end - next.start, Duration::days(7));
        assert_eq!(prior.end - prior.start, Duration::days(7));
    }
}
