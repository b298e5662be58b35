//! Role lattice
//!
//! Four roles in a strict privilege order. `SuperUser` is a user attribute,
//! never a stored membership role; the other three only exist on memberships.

use serde::{Deserialize, Serialize};

/// Privilege roles, declared in ascending rank so `Ord` follows the lattice.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Tenant,
    PropertyAdmin,
    GroupAdmin,
    SuperUser,
}

impl Role {
    /// Numeric rank used for "highest privilege wins" resolution.
    pub fn rank(&self) -> u8 {
        match self {
            Role::Tenant => 1,
            Role::PropertyAdmin => 2,
            Role::GroupAdmin => 3,
            Role::SuperUser => 4,
        }
    }

    /// Whether this role may appear on a membership row.
    pub fn is_membership_role(&self) -> bool {
        !matches!(self, Role::SuperUser)
    }

    /// Whether this role carries management rights over other users.
    pub fn is_admin(&self) -> bool {
        *self >= Role::PropertyAdmin
    }

    /// Human-readable label for emails and console listings.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Tenant => "Tenant",
            Role::PropertyAdmin => "Property Admin",
            Role::GroupAdmin => "Property Group Admin",
            Role::SuperUser => "Super User",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tenant" => Ok(Self::Tenant),
            "property_admin" => Ok(Self::PropertyAdmin),
            "group_admin" => Ok(Self::GroupAdmin),
            "super_user" => Ok(Self::SuperUser),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tenant => write!(f, "tenant"),
            Self::PropertyAdmin => write!(f, "property_admin"),
            Self::GroupAdmin => write!(f, "group_admin"),
            Self::SuperUser => write!(f, "super_user"),
        }
    }
}

impl sqlx::Type<sqlx::MySql> for Role {
    fn type_info() -> sqlx::mysql::MySqlTypeInfo {
        <String as sqlx::Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::MySql>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::MySql> for Role {
    fn decode(value: sqlx::mysql::MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = sqlx::Decode::<'r, sqlx::MySql>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl<'q> sqlx::Encode<'q, sqlx::MySql> for Role {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<u8>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        let s = self.to_string();
        <&str as sqlx::Encode<sqlx::MySql>>::encode_by_ref(&s.as_str(), buf)
    }
}
