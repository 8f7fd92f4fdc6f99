//! User model
//!
//! Accounts, roles and the role hierarchy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// User entity representing a registered account.
///
/// Write-only fields (plain passwords, their repetitions, the old password
/// during a reset) never live here; they stay in request view models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Login name (unique)
    pub username: String,
    /// Display name
    pub name: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Granted roles, never empty
    pub roles: Roles,
    /// Whether the account has been confirmed
    pub enabled: bool,
    /// Pending confirmation token, cleared once consumed
    #[serde(skip_serializing)]
    pub confirmation_token: Option<String>,
    /// Epoch seconds of the last password change
    pub password_change_date: Option<i64>,
}

impl User {
    /// Check whether the user holds `role`, directly or through a higher role.
    pub fn is_granted(&self, role: Role) -> bool {
        self.roles.is_granted(role)
    }

    /// Check if the user is an administrator (or higher)
    pub fn is_admin(&self) -> bool {
        self.is_granted(Role::Admin)
    }

    /// Check if the user is an editor (or higher)
    pub fn is_editor(&self) -> bool {
        self.is_granted(Role::Editor)
    }

    /// Editors may change anything; everyone else only what they authored.
    pub fn can_edit(&self, author_id: i64) -> bool {
        self.is_editor() || self.id == author_id
    }
}

/// Role tag, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ROLE_COMMENTATOR")]
    Commentator,
    #[serde(rename = "ROLE_WRITER")]
    Writer,
    #[serde(rename = "ROLE_EDITOR")]
    Editor,
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
    #[serde(rename = "ROLE_SUPERADMIN")]
    SuperAdmin,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Commentator => "ROLE_COMMENTATOR",
            Role::Writer => "ROLE_WRITER",
            Role::Editor => "ROLE_EDITOR",
            Role::Admin => "ROLE_ADMIN",
            Role::SuperAdmin => "ROLE_SUPERADMIN",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::Commentator
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ROLE_COMMENTATOR" => Ok(Role::Commentator),
            "ROLE_WRITER" => Ok(Role::Writer),
            "ROLE_EDITOR" => Ok(Role::Editor),
            "ROLE_ADMIN" => Ok(Role::Admin),
            "ROLE_SUPERADMIN" => Ok(Role::SuperAdmin),
            _ => Err(anyhow::anyhow!("Invalid role: {}", s)),
        }
    }
}

/// Non-empty set of roles. Defaults to `{ROLE_COMMENTATOR}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Role>", into = "Vec<Role>")]
pub struct Roles(BTreeSet<Role>);

impl Roles {
    /// Build a role set, falling back to the default role when `roles` is empty.
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        let set: BTreeSet<Role> = roles.into_iter().collect();
        if set.is_empty() {
            Self::default()
        } else {
            Self(set)
        }
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// True when any held role is `role` or above it in the hierarchy.
    pub fn is_granted(&self, role: Role) -> bool {
        self.0.iter().any(|held| *held >= role)
    }

    pub fn insert(&mut self, role: Role) {
        self.0.insert(role);
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    /// Comma-separated storage form, e.g. `ROLE_COMMENTATOR,ROLE_WRITER`.
    pub fn to_db_string(&self) -> String {
        self.iter().map(Role::as_str).collect::<Vec<_>>().join(",")
    }
}

impl Default for Roles {
    fn default() -> Self {
        Self(BTreeSet::from([Role::Commentator]))
    }
}

impl FromStr for Roles {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let set = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Role::from_str)
            .collect::<Result<BTreeSet<_>, _>>()?;
        if set.is_empty() {
            anyhow::bail!("Role set must not be empty");
        }
        Ok(Self(set))
    }
}

impl TryFrom<Vec<Role>> for Roles {
    type Error = String;

    fn try_from(roles: Vec<Role>) -> Result<Self, Self::Error> {
        if roles.is_empty() {
            return Err("Role set must not be empty".to_string());
        }
        Ok(Self(roles.into_iter().collect()))
    }
}

impl From<Roles> for Vec<Role> {
    fn from(roles: Roles) -> Self {
        roles.0.into_iter().collect()
    }
}

/// A user about to be inserted.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub roles: Roles,
    pub enabled: bool,
    pub confirmation_token: Option<String>,
}

impl NewUser {
    /// A disabled account with the default role set awaiting confirmation.
    pub fn pending(
        username: String,
        name: String,
        email: String,
        password_hash: String,
        confirmation_token: String,
    ) -> Self {
        Self {
            username,
            name,
            email,
            password_hash,
            roles: Roles::default(),
            enabled: false,
            confirmation_token: Some(confirmation_token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(roles: &[Role]) -> User {
        User {
            id: 1,
            username: "testuser".to_string(),
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            password_hash: "hash".to_string(),
            roles: Roles::new(roles.iter().copied()),
            enabled: true,
            confirmation_token: None,
            password_change_date: None,
        }
    }

    #[test]
    fn test_role_hierarchy() {
        let writer = user_with(&[Role::Writer]);
        assert!(writer.is_granted(Role::Commentator));
        assert!(writer.is_granted(Role::Writer));
        assert!(!writer.is_granted(Role::Editor));

        let superadmin = user_with(&[Role::SuperAdmin]);
        assert!(superadmin.is_admin());
        assert!(superadmin.is_editor());
        assert!(superadmin.is_granted(Role::Commentator));
    }

    #[test]
    fn test_can_edit() {
        let writer = user_with(&[Role::Writer]);
        assert!(writer.can_edit(1));
        assert!(!writer.can_edit(2));

        let editor = user_with(&[Role::Editor]);
        assert!(editor.can_edit(2));
    }

    #[test]
    fn test_roles_never_empty() {
        let roles = Roles::new(Vec::new());
        assert_eq!(roles, Roles::default());
        assert!(roles.contains(Role::Commentator));

        assert!("".parse::<Roles>().is_err());
        assert!(serde_json::from_str::<Roles>("[]").is_err());
    }

    #[test]
    fn test_roles_db_string() {
        let roles = Roles::new([Role::Writer, Role::Commentator]);
        assert_eq!(roles.to_db_string(), "ROLE_COMMENTATOR,ROLE_WRITER");

        let parsed: Roles = "ROLE_WRITER, ROLE_COMMENTATOR".parse().unwrap();
        assert_eq!(parsed, roles);
        assert!("ROLE_UNKNOWN".parse::<Roles>().is_err());
    }

    #[test]
    fn test_roles_serialize_as_list() {
        let roles = Roles::new([Role::Admin]);
        assert_eq!(serde_json::to_string(&roles).unwrap(), r#"["ROLE_ADMIN"]"#);
    }

    #[test]
    fn test_role_from_str_is_case_insensitive() {
        assert_eq!(Role::from_str("role_editor").unwrap(), Role::Editor);
        assert_eq!(Role::default(), Role::Commentator);
        assert_eq!(Role::SuperAdmin.to_string(), "ROLE_SUPERADMIN");
    }

    #[test]
    fn test_pending_user_is_disabled() {
        let user = NewUser::pending(
            "newuser".to_string(),
            "New User".to_string(),
            "new@example.com".to_string(),
            "hash".to_string(),
            "token".to_string(),
        );
        assert!(!user.enabled);
        assert_eq!(user.roles, Roles::default());
        assert_eq!(user.confirmation_token.as_deref(), Some("token"));
    }
}
