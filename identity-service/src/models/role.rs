//! System role hierarchy.
//!
//! Roles form a total order used only for authorization decisions. An
//! identity may hold several roles; the highest rank decides outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemRole {
    Developer,
    Owner,
    Admin,
    User,
}

impl SystemRole {
    pub const ALL: [SystemRole; 4] = [
        SystemRole::Developer,
        SystemRole::Owner,
        SystemRole::Admin,
        SystemRole::User,
    ];

    /// Position in the hierarchy; higher outranks lower.
    pub fn rank(&self) -> u8 {
        match self {
            SystemRole::Developer => 4,
            SystemRole::Owner => 3,
            SystemRole::Admin => 2,
            SystemRole::User => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SystemRole::Developer => "Developer",
            SystemRole::Owner => "Owner",
            SystemRole::Admin => "Admin",
            SystemRole::User => "User",
        }
    }

    /// Developer and Owner act across tenant boundaries.
    pub fn is_system_level(&self) -> bool {
        matches!(self, SystemRole::Developer | SystemRole::Owner)
    }

    /// Highest-ranked role among a set of role names; unknown names are
    /// ignored since only hierarchy roles carry authorization weight.
    pub fn highest<'a, I>(names: I) -> Option<SystemRole>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .filter_map(|n| n.parse::<SystemRole>().ok())
            .max_by_key(|r| r.rank())
    }

    /// Highest rank held, with 0 meaning "no hierarchy role at all".
    pub fn highest_rank(roles: &[SystemRole]) -> u8 {
        roles.iter().map(|r| r.rank()).max().unwrap_or(0)
    }

    /// Parse the hierarchy roles out of a name list, dropping unknowns.
    pub fn parse_known<S: AsRef<str>>(names: &[S]) -> Vec<SystemRole> {
        names
            .iter()
            .filter_map(|n| n.as_ref().parse::<SystemRole>().ok())
            .collect()
    }
}

impl fmt::Display for SystemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Developer" => Ok(SystemRole::Developer),
            "Owner" => Ok(SystemRole::Owner),
            "Admin" => Ok(SystemRole::Admin),
            "User" => Ok(SystemRole::User),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}
