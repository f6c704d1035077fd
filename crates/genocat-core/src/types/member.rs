//! Principals and ACL members.
//!
//! A member is the subject of an ACL entry: a user id, a group reference
//! written `@groupName`, the wildcard `*`, or the reserved `anonymous`
//! principal. The reserved user id `admin` identifies the daemon principal
//! and resolves through a separate daemon-ACL table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Reserved user id for the catalog daemon.
pub const ADMIN_USER: &str = "admin";

/// Reserved user id for unauthenticated requests.
pub const ANONYMOUS_USER: &str = "anonymous";

/// The subject of an ACL entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Member {
    /// A registered user, referenced by user id.
    User(String),
    /// A study group; the textual form carries the `@` prefix, the variant
    /// stores the bare group name.
    Group(String),
    /// The wildcard `*`, matching any registered user.
    Anyone,
    /// The reserved `anonymous` principal for unauthenticated requests.
    Anonymous,
}

impl Member {
    /// Parse the caller of a request into a member.
    pub fn principal(user_id: &str) -> Self {
        if user_id.eq_ignore_ascii_case(ANONYMOUS_USER) {
            Self::Anonymous
        } else {
            Self::User(user_id.to_string())
        }
    }

    /// Whether this member is the reserved daemon principal.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::User(u) if u == ADMIN_USER)
    }

    /// Whether this member is a group reference.
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    /// Whether this member is exempt from the study-level ACL precondition
    /// when creating entity-level ACLs.
    pub fn is_precondition_exempt(&self) -> bool {
        matches!(self, Self::Anyone | Self::Anonymous)
    }

    /// The user id, if this member is a plain user.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User(u) => Some(u),
            _ => None,
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(u) => write!(f, "{u}"),
            Self::Group(g) => write!(f, "@{g}"),
            Self::Anyone => write!(f, "*"),
            Self::Anonymous => write!(f, "{ANONYMOUS_USER}"),
        }
    }
}

impl FromStr for Member {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(CatalogError::invalid_argument("Empty member reference"));
        }
        if s == "*" {
            return Ok(Self::Anyone);
        }
        if s.eq_ignore_ascii_case(ANONYMOUS_USER) {
            return Ok(Self::Anonymous);
        }
        if let Some(group) = s.strip_prefix('@') {
            if group.is_empty() {
                return Err(CatalogError::invalid_argument(
                    "Empty group name in member reference '@'",
                ));
            }
            return Ok(Self::Group(group.to_string()));
        }
        Ok(Self::User(s.to_string()))
    }
}

impl From<Member> for String {
    fn from(member: Member) -> String {
        member.to_string()
    }
}

impl TryFrom<String> for Member {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shapes() {
        assert_eq!("pfurio".parse::<Member>().unwrap(), Member::User("pfurio".into()));
        assert_eq!("@admins".parse::<Member>().unwrap(), Member::Group("admins".into()));
        assert_eq!("*".parse::<Member>().unwrap(), Member::Anyone);
        assert_eq!("anonymous".parse::<Member>().unwrap(), Member::Anonymous);
        assert_eq!("ANONYMOUS".parse::<Member>().unwrap(), Member::Anonymous);
        assert!("".parse::<Member>().is_err());
        assert!("@".parse::<Member>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for raw in ["user1", "@members", "*", "anonymous"] {
            let member: Member = raw.parse().unwrap();
            let back: Member = member.to_string().parse().unwrap();
            assert_eq!(member, back);
        }
    }

    #[test]
    fn test_precondition_exemption() {
        assert!(Member::Anyone.is_precondition_exempt());
        assert!(Member::Anonymous.is_precondition_exempt());
        assert!(!Member::User("u".into()).is_precondition_exempt());
        assert!(!Member::Group("g".into()).is_precondition_exempt());
    }

    #[test]
    fn test_admin_principal() {
        assert!(Member::principal("admin").is_admin());
        assert_eq!(Member::principal("anonymous"), Member::Anonymous);
    }
}
