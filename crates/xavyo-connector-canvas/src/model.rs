//! Typed views of Canvas JSON records.
//!
//! Only the fields the connector reads are declared; everything else in the
//! payload is ignored.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer};

/// Keep "present but null" distinct from "absent".
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A user as returned by `/users/{id}` or `/accounts/{id}/users`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    #[serde(default)]
    pub login_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub sortable_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<FixedOffset>>,
}

/// A login (pseudonym) of a user, from `/users/{id}/logins`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRecord {
    pub id: u64,
    pub account_id: u64,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub workflow_state: Option<String>,
    /// `Some(None)` when Canvas sends an explicit null.
    #[serde(default, deserialize_with = "present")]
    pub authentication_provider_id: Option<Option<u64>>,
}

impl LoginRecord {
    /// Whether the login may sign in.
    pub fn is_active(&self) -> bool {
        self.workflow_state.as_deref() == Some(LOGIN_ACTIVE)
    }
}

/// `workflow_state` of an active login.
pub const LOGIN_ACTIVE: &str = "active";
/// `workflow_state` of a suspended login.
pub const LOGIN_SUSPENDED: &str = "suspended";

/// A course, from `/courses/{id}` or `/accounts/{id}/courses`.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseRecord {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub workflow_state: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub start_at: Option<String>,
    #[serde(default)]
    pub end_at: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    pub is_public_to_auth_users: Option<bool>,
}

/// Lifecycle state of an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentState {
    Active,
    Invited,
    CreationPending,
    Deleted,
    Rejected,
    Completed,
    Inactive,
}

impl EnrollmentState {
    /// States requested when reading enrollments. `deleted` is never asked
    /// for.
    pub const FETCHED: [EnrollmentState; 6] = [
        EnrollmentState::Active,
        EnrollmentState::Invited,
        EnrollmentState::CreationPending,
        EnrollmentState::Rejected,
        EnrollmentState::Completed,
        EnrollmentState::Inactive,
    ];

    /// Wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentState::Active => "active",
            EnrollmentState::Invited => "invited",
            EnrollmentState::CreationPending => "creation_pending",
            EnrollmentState::Deleted => "deleted",
            EnrollmentState::Rejected => "rejected",
            EnrollmentState::Completed => "completed",
            EnrollmentState::Inactive => "inactive",
        }
    }

    /// Counts toward the membership sets reported on objects.
    pub fn is_current(&self) -> bool {
        matches!(self, EnrollmentState::Active | EnrollmentState::Invited)
    }

    /// Already concluded or deactivated; never deactivated again.
    pub fn is_inactive(&self) -> bool {
        matches!(self, EnrollmentState::Inactive | EnrollmentState::Completed)
    }
}

impl std::fmt::Display for EnrollmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An enrollment as returned by `/courses/{id}/enrollments` or
/// `/users/{id}/enrollments`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnrollmentRecord {
    pub id: u64,
    pub user_id: u64,
    pub course_id: u64,
    pub enrollment_state: EnrollmentState,
    pub role_id: u64,
    #[serde(default)]
    pub root_account_id: Option<u64>,
}
