use serde::{Deserialize, Serialize};

/// The four user roles. Assigned once at signup (admin only ever by hand)
/// and resolved from the user_roles table, never from the profile row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    School,
    Senior,
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::School => "school",
            Role::Senior => "senior",
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "school" => Some(Role::School),
            "senior" => Some(Role::Senior),
            "student" => Some(Role::Student),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Interest tags a senior can pick at signup or on profile edit.
pub const SENIOR_INTERESTS: &[&str] = &[
    "Art",
    "Farming",
    "Organic Farming",
    "Education",
    "Crafts",
    "Stitching",
    "Storytelling",
    "Cooking",
    "Gardening",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub full_name: String,
    pub age: i64,
    pub mobile_number: String,
    pub email: String,
    pub coins: i64,
    pub interests: Vec<String>,
    pub description: Option<String>,
    pub profile_image: Option<String>,
    pub school_name: Option<String>,
    pub school_email: Option<String>,
    pub theme_preference: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Accepted,
    Rejected,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Accepted => "accepted",
            ResponseStatus::Rejected => "rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::School, Role::Senior, Role::Student, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert_eq!(Role::parse("parent"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Senior).unwrap(), "\"senior\"");
        let parsed: Role = serde_json::from_str("\"school\"").unwrap();
        assert_eq!(parsed, Role::School);
    }

    #[test]
    fn response_status_strings() {
        assert_eq!(ResponseStatus::Accepted.as_str(), "accepted");
        assert_eq!(ResponseStatus::Rejected.as_str(), "rejected");
        let parsed: ResponseStatus = serde_json::from_str("\"rejected\"").unwrap();
        assert_eq!(parsed, ResponseStatus::Rejected);
    }
}
