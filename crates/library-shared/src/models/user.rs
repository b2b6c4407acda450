use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role, stored and serialized as the two-letter codes the
/// original catalog used (`AD`, `LB`, `US`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "user_role"))]
pub enum Role {
    #[serde(rename = "AD")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "AD"))]
    Admin,
    #[serde(rename = "LB")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "LB"))]
    Librarian,
    #[serde(rename = "US")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "US"))]
    User,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Librarian => "Librarian",
            Self::User => "User",
        }
    }

    /// Admin-only surfaces: user listing, user detail, user deletion.
    pub fn can_manage_users(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Catalog mutations (add/edit/remove books).
    pub fn can_manage_books(&self) -> bool {
        matches!(self, Self::Admin | Self::Librarian)
    }

    /// Staff may return a loan on behalf of any borrower.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Admin | Self::Librarian)
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::User
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "type")]
    pub role: Role,
    pub type_display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Profile {
    pub fn new(role: Role, age: Option<i32>, avatar_url: Option<String>) -> Self {
        Self {
            role,
            type_display: role.label().to_string(),
            age,
            avatar_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

impl User {
    /// Role as recorded on the profile; accounts without a profile are
    /// treated as regular users.
    pub fn role(&self) -> Role {
        self.profile.as_ref().map(|p| p.role).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_codes_round_trip() {
        for (role, code) in [
            (Role::Admin, "\"AD\""),
            (Role::Librarian, "\"LB\""),
            (Role::User, "\"US\""),
        ] {
            assert_eq!(serde_json::to_string(&role).unwrap(), code);
            let parsed: Role = serde_json::from_str(code).unwrap();
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn admin_permissions() {
        assert!(Role::Admin.can_manage_users());
        assert!(Role::Admin.can_manage_books());
        assert!(Role::Admin.is_staff());
    }

    #[test]
    fn librarian_manages_books_not_users() {
        assert!(!Role::Librarian.can_manage_users());
        assert!(Role::Librarian.can_manage_books());
        assert!(Role::Librarian.is_staff());
    }

    #[test]
    fn regular_user_has_no_staff_powers() {
        assert!(!Role::User.can_manage_users());
        assert!(!Role::User.can_manage_books());
        assert!(!Role::User.is_staff());
    }

    #[test]
    fn missing_profile_defaults_to_regular_user() {
        let user = User {
            id: Uuid::new_v4(),
            username: "nobody".into(),
            email: "nobody@example.com".into(),
            first_name: String::new(),
            last_name: String::new(),
            profile: None,
            is_staff: false,
            date_joined: Utc::now(),
        };
        assert_eq!(user.role(), Role::User);
    }
}
