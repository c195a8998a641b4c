use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use super::UnknownValue;
use crate::schema::users;

text_enum!(
    /// Account kind, stored lowercase in `users.role`.
    Role {
        Admin => "admin",
        Owner => "owner",
        Tenant => "tenant",
    }
);

text_enum!(
    TenantStatus {
        Active => "active",
        Pending => "pending",
        Inactive => "inactive",
        Evicted => "evicted",
    }
);

/// The wide storage row; use [`User`] everywhere past the query.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserRow {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub phone: Option<String>,
    pub business_permit_path: Option<String>,
    pub property_name: Option<String>,
    pub unit_number: Option<String>,
    pub lease_start: Option<NaiveDateTime>,
    pub lease_end: Option<NaiveDateTime>,
    pub monthly_rent: Option<i64>,
    pub tenant_status: Option<String>,
    pub concierge_name: Option<String>,
    pub balance_due: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: &'a str,
    pub phone: Option<&'a str>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerProfile {
    pub business_permit_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TenantProfile {
    pub property_name: Option<String>,
    pub unit_number: Option<String>,
    pub lease_start: Option<NaiveDateTime>,
    pub lease_end: Option<NaiveDateTime>,
    pub monthly_rent: Option<i64>,
    pub tenant_status: Option<TenantStatus>,
    pub concierge_name: Option<String>,
    pub balance_due: i64,
}

/// Role-specific fields; only the variant's own columns are meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Profile {
    Admin,
    Owner(OwnerProfile),
    Tenant(TenantProfile),
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(flatten)]
    pub profile: Profile,
    pub created_at: NaiveDateTime,
}

impl User {
    pub fn role(&self) -> Role {
        match self.profile {
            Profile::Admin => Role::Admin,
            Profile::Owner(_) => Role::Owner,
            Profile::Tenant(_) => Role::Tenant,
        }
    }

    pub fn tenant_profile(&self) -> Option<&TenantProfile> {
        match &self.profile {
            Profile::Tenant(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn owner_profile(&self) -> Option<&OwnerProfile> {
        match &self.profile {
            Profile::Owner(profile) => Some(profile),
            _ => None,
        }
    }
}

impl TryFrom<UserRow> for User {
    type Error = UnknownValue;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let profile = match row.role.parse::<Role>()? {
            Role::Admin => Profile::Admin,
            Role::Owner => Profile::Owner(OwnerProfile {
                business_permit_path: row.business_permit_path,
            }),
            Role::Tenant => Profile::Tenant(TenantProfile {
                property_name: row.property_name,
                unit_number: row.unit_number,
                lease_start: row.lease_start,
                lease_end: row.lease_end,
                monthly_rent: row.monthly_rent,
                tenant_status: row
                    .tenant_status
                    .as_deref()
                    .map(str::parse::<TenantStatus>)
                    .transpose()?,
                concierge_name: row.concierge_name,
                balance_due: row.balance_due.unwrap_or(0),
            }),
        };
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            profile,
            created_at: row.created_at,
        })
    }
}

pub fn find_user(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<Option<UserRow>> {
    users::table
        .find(user_id)
        .select(UserRow::as_select())
        .first(conn)
        .optional()
}

pub fn find_by_email(conn: &mut SqliteConnection, email: &str) -> QueryResult<Option<UserRow>> {
    users::table
        .filter(users::email.eq(email.trim().to_ascii_lowercase()))
        .select(UserRow::as_select())
        .first(conn)
        .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(role: &str) -> UserRow {
        let at = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        UserRow {
            id: 7,
            name: "Ana Cruz".into(),
            email: "ana@example.com".into(),
            password_hash: "x".into(),
            role: role.into(),
            phone: None,
            business_permit_path: Some("properties/permits/a.pdf".into()),
            property_name: Some("Sea Breeze".into()),
            unit_number: Some("2B".into()),
            lease_start: None,
            lease_end: None,
            monthly_rent: Some(8000),
            tenant_status: Some("Active".into()),
            concierge_name: None,
            balance_due: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn tenant_rows_keep_only_tenant_fields() {
        let user = User::try_from(row("tenant")).unwrap();
        assert_eq!(user.role(), Role::Tenant);
        let profile = user.tenant_profile().unwrap();
        assert_eq!(profile.tenant_status, Some(TenantStatus::Active));
        assert_eq!(profile.balance_due, 0);
        assert!(user.owner_profile().is_none());
    }

    #[test]
    fn owner_rows_drop_tenant_fields() {
        let user = User::try_from(row("OWNER")).unwrap();
        assert_eq!(
            user.profile,
            Profile::Owner(OwnerProfile {
                business_permit_path: Some("properties/permits/a.pdf".into())
            })
        );
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["role"], "owner");
        assert!(json.get("unit_number").is_none());
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(User::try_from(row("landlord")).is_err());
    }
}
