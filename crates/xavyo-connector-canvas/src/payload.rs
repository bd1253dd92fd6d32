//! Request payloads built from connector attributes.
//!
//! Incoming attributes are routed through the tables in [`crate::routing`]:
//! profile fields become the user patch, login fields the login patch, and
//! membership sets become [`MembershipChanges`] for the enrollment engine.

use serde_json::{json, Map, Value};

use xavyo_connector::error::{ConnectorError, ConnectorResult};
use xavyo_connector::operation::{AttributeDelta, AttributeSet, AttributeValue};

use crate::enrollment::{parse_ids, MembershipChanges, MembershipRole};
use crate::model::{LOGIN_ACTIVE, LOGIN_SUSPENDED};
use crate::routing::{AttributeRoute, CanvasObjectClass, LoginField, Route};

static NULL: AttributeValue = AttributeValue::Null;

/// Single value of an attribute, `None` when absent or null.
fn single_value<'v>(
    route: &AttributeRoute,
    value: &'v AttributeValue,
) -> ConnectorResult<Option<&'v AttributeValue>> {
    let values = value.values();
    match values.as_slice() {
        [] => Ok(None),
        [one] => Ok(Some(*one)),
        _ => Err(ConnectorError::invalid_argument(format!(
            "{} is single-valued",
            route.name
        ))),
    }
}

fn text_value(route: &AttributeRoute, value: &AttributeValue) -> ConnectorResult<Option<String>> {
    match single_value(route, value)? {
        None => Ok(None),
        Some(AttributeValue::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ConnectorError::invalid_argument(format!(
            "{} must be a string, got {other:?}",
            route.name
        ))),
    }
}

fn id_value(route: &AttributeRoute, value: &AttributeValue) -> ConnectorResult<Option<u64>> {
    match single_value(route, value)? {
        None => Ok(None),
        Some(one) => parse_ids(route.name, [one]).map(|ids| ids.first().copied()),
    }
}

fn bool_value(route: &AttributeRoute, value: &AttributeValue) -> ConnectorResult<Option<bool>> {
    match single_value(route, value)? {
        None => Ok(None),
        Some(AttributeValue::Boolean(b)) => Ok(Some(*b)),
        Some(other) => Err(ConnectorError::invalid_argument(format!(
            "{} must be a boolean, got {other:?}",
            route.name
        ))),
    }
}

/// Changes to the login sub-record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginPatch {
    pub unique_id: Option<String>,
    /// `Some(None)` resets the provider to the account default.
    pub authentication_provider_id: Option<Option<u64>>,
    pub enabled: Option<bool>,
    pub password: Option<String>,
}

impl LoginPatch {
    /// No login changes at all.
    pub fn is_empty(&self) -> bool {
        self.unique_id.is_none()
            && self.authentication_provider_id.is_none()
            && self.enabled.is_none()
            && self.password.is_none()
    }

    /// Whether a change other than the password is pending.
    pub fn has_non_password_changes(&self) -> bool {
        self.unique_id.is_some()
            || self.authentication_provider_id.is_some()
            || self.enabled.is_some()
    }

    /// Body of the login update, without the password.
    pub fn body(&self) -> Value {
        let mut login = Map::new();
        if let Some(unique_id) = &self.unique_id {
            login.insert("unique_id".to_string(), json!(unique_id));
        }
        if let Some(provider) = &self.authentication_provider_id {
            login.insert("authentication_provider_id".to_string(), json!(provider));
        }
        if let Some(enabled) = self.enabled {
            let state = if enabled { LOGIN_ACTIVE } else { LOGIN_SUSPENDED };
            login.insert("workflow_state".to_string(), json!(state));
        }
        json!({ "login": login })
    }

    /// Body of the password update, if a password is pending.
    pub fn password_body(&self) -> Option<Value> {
        self.password
            .as_ref()
            .map(|password| json!({ "login": { "password": password } }))
    }

    fn set(&mut self, field: LoginField, route: &AttributeRoute, value: &AttributeValue) -> ConnectorResult<()> {
        let cleared = || {
            ConnectorError::invalid_argument(format!("{} cannot be cleared", route.name))
        };
        match field {
            LoginField::UniqueId => {
                self.unique_id = Some(text_value(route, value)?.ok_or_else(cleared)?);
            }
            LoginField::AuthenticationProvider => {
                self.authentication_provider_id = Some(id_value(route, value)?);
            }
            LoginField::Enabled => {
                self.enabled = Some(bool_value(route, value)?.ok_or_else(cleared)?);
            }
            LoginField::Password => {
                self.password = Some(text_value(route, value)?.ok_or_else(cleared)?);
            }
        }
        Ok(())
    }

    fn clear(&mut self, field: LoginField, route: &AttributeRoute) -> ConnectorResult<()> {
        self.set(field, route, &NULL)
    }
}

/// An update delta split by destination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectChanges {
    /// Properties of the user profile patch, by REST name.
    pub profile: Map<String, Value>,
    pub login: LoginPatch,
    pub memberships: MembershipChanges,
}

impl ObjectChanges {
    /// Route every attribute of `delta`.
    ///
    /// `replace` is handled first and `clear` acts as a replace with no
    /// values; attributes named there are skipped in `add` and `remove`.
    /// `add` on a single-valued attribute sets it, `remove` on one clears it.
    pub fn from_delta(class: CanvasObjectClass, delta: &AttributeDelta) -> ConnectorResult<Self> {
        let mut changes = Self::default();

        let mut replaced: Vec<(&str, &AttributeValue)> = delta
            .replace
            .iter()
            .map(|(name, value)| (name.as_str(), value))
            .collect();
        for name in &delta.clear {
            if !delta.replace.contains_key(name) {
                replaced.push((name.as_str(), &NULL));
            }
        }
        replaced.sort_by_key(|(name, _)| *name);
        let handled: Vec<&str> = replaced.iter().map(|(name, _)| *name).collect();

        for (name, value) in &replaced {
            let route = class.writable_route(name)?;
            match route.route {
                Route::Membership(role) => {
                    changes
                        .memberships
                        .replace
                        .push((role, parse_ids(route.name, value.values())?));
                }
                _ => changes.set_scalar(route, value)?,
            }
        }

        for (name, value) in sorted(&delta.add, &handled) {
            let route = class.writable_route(name)?;
            match route.route {
                Route::Membership(role) => {
                    changes
                        .memberships
                        .add
                        .push((role, parse_ids(route.name, value.values())?));
                }
                _ => changes.set_scalar(route, value)?,
            }
        }

        for (name, value) in sorted(&delta.remove, &handled) {
            let route = class.writable_route(name)?;
            match route.route {
                Route::Membership(role) => {
                    changes
                        .memberships
                        .remove
                        .push((role, parse_ids(route.name, value.values())?));
                }
                Route::Profile(property) => {
                    changes.profile.insert(property.to_string(), Value::Null);
                }
                Route::Login(field) => changes.login.clear(field, route)?,
                Route::Identifier | Route::ReadOnly => {}
            }
        }

        Ok(changes)
    }

    fn set_scalar(&mut self, route: &AttributeRoute, value: &AttributeValue) -> ConnectorResult<()> {
        match route.route {
            Route::Profile(property) => {
                let text = text_value(route, value)?;
                self.profile.insert(property.to_string(), json!(text));
            }
            Route::Login(field) => self.login.set(field, route, value)?,
            Route::Identifier | Route::ReadOnly | Route::Membership(_) => {}
        }
        Ok(())
    }
}

fn sorted<'d>(
    partition: &'d std::collections::HashMap<String, AttributeValue>,
    skip: &[&str],
) -> Vec<(&'d str, &'d AttributeValue)> {
    let mut entries: Vec<(&str, &AttributeValue)> = partition
        .iter()
        .map(|(name, value)| (name.as_str(), value))
        .filter(|(name, _)| !skip.contains(name))
        .collect();
    entries.sort_by_key(|(name, _)| *name);
    entries
}

/// A user to create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDraft {
    pub login: String,
    pub full_name: String,
    pub short_name: Option<String>,
    pub email: Option<String>,
    pub authentication_provider_id: Option<u64>,
    pub password: Option<String>,
    pub enabled: Option<bool>,
    pub student_course_ids: Vec<u64>,
    pub teacher_course_ids: Vec<u64>,
}

impl UserDraft {
    /// Read a draft from create attributes.
    ///
    /// The login name and full name are required; read-only or unknown
    /// attributes are rejected.
    pub fn from_attributes(attributes: &AttributeSet) -> ConnectorResult<Self> {
        let class = CanvasObjectClass::User;
        let mut draft = Self::default();
        let mut login_name = None;
        let mut full_name = None;

        for (name, value) in attributes.iter() {
            let route = class.writable_route(name)?;
            match route.route {
                Route::Login(LoginField::UniqueId) => login_name = text_value(route, value)?,
                Route::Login(LoginField::AuthenticationProvider) => {
                    draft.authentication_provider_id = id_value(route, value)?;
                }
                Route::Login(LoginField::Password) => draft.password = text_value(route, value)?,
                Route::Login(LoginField::Enabled) => draft.enabled = bool_value(route, value)?,
                Route::Profile("name") => full_name = text_value(route, value)?,
                Route::Profile("short_name") => draft.short_name = text_value(route, value)?,
                Route::Profile("email") => draft.email = text_value(route, value)?,
                Route::Membership(MembershipRole::Student) => {
                    draft.student_course_ids = parse_ids(route.name, value.values())?;
                }
                Route::Membership(MembershipRole::Teacher) => {
                    draft.teacher_course_ids = parse_ids(route.name, value.values())?;
                }
                Route::Profile(_) | Route::Identifier | Route::ReadOnly => {}
            }
        }

        draft.login = login_name
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConnectorError::invalid_argument("login name is required"))?;
        draft.full_name = full_name
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConnectorError::invalid_argument("full_name is required"))?;
        Ok(draft)
    }

    /// Body of the account user creation call.
    pub fn body(&self) -> Value {
        let mut user = Map::new();
        user.insert("name".to_string(), json!(self.full_name));
        if let Some(short_name) = &self.short_name {
            user.insert("short_name".to_string(), json!(short_name));
        }
        user.insert("skip_registration".to_string(), json!(true));
        user.insert("send_confirmation".to_string(), json!(true));

        let mut pseudonym = Map::new();
        pseudonym.insert("unique_id".to_string(), json!(self.login));
        if let Some(provider) = self.authentication_provider_id {
            pseudonym.insert("authentication_provider_id".to_string(), json!(provider));
        }
        if let Some(password) = &self.password {
            pseudonym.insert("password".to_string(), json!(password));
        }

        let mut body = Map::new();
        body.insert("user".to_string(), Value::Object(user));
        body.insert("pseudonym".to_string(), Value::Object(pseudonym));
        if let Some(email) = &self.email {
            body.insert(
                "communication_channel".to_string(),
                json!({ "type": "mail", "address": email }),
            );
        }
        Value::Object(body)
    }

    /// Initial memberships, applied after the user exists.
    pub fn memberships(&self) -> MembershipChanges {
        let mut changes = MembershipChanges::default();
        for (role, ids) in [
            (MembershipRole::Student, &self.student_course_ids),
            (MembershipRole::Teacher, &self.teacher_course_ids),
        ] {
            if !ids.is_empty() {
                changes.add.push((role, ids.clone()));
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xavyo_connector::operation::{ENABLE_ATTRIBUTE, NAME_ATTRIBUTE, PASSWORD_ATTRIBUTE};

    #[test]
    fn test_draft_requires_login_and_name() {
        let attrs = AttributeSet::new().with("full_name", "Ada");
        assert_eq!(
            UserDraft::from_attributes(&attrs).unwrap_err().error_code(),
            "INVALID_ARGUMENT"
        );

        let attrs = AttributeSet::new().with(NAME_ATTRIBUTE, "ada");
        assert!(UserDraft::from_attributes(&attrs).is_err());
    }

    #[test]
    fn test_draft_rejects_read_only() {
        let attrs = AttributeSet::new()
            .with(NAME_ATTRIBUTE, "ada")
            .with("full_name", "Ada")
            .with("created_at", "2024-01-01T00:00:00Z");
        assert!(matches!(
            UserDraft::from_attributes(&attrs),
            Err(ConnectorError::AttributeNotWritable { .. })
        ));
    }

    #[test]
    fn test_draft_body() {
        let attrs = AttributeSet::new()
            .with(NAME_ATTRIBUTE, "ada")
            .with("full_name", "Ada Lovelace")
            .with("email", "ada@example.edu")
            .with("authentication_provider_id", 3i64)
            .with(PASSWORD_ATTRIBUTE, "s3cret")
            .with(ENABLE_ATTRIBUTE, false)
            .with("student_course_ids", vec!["10", "11"]);
        let draft = UserDraft::from_attributes(&attrs).unwrap();

        assert_eq!(draft.enabled, Some(false));
        assert_eq!(
            draft.body(),
            json!({
                "user": {
                    "name": "Ada Lovelace",
                    "skip_registration": true,
                    "send_confirmation": true
                },
                "pseudonym": {
                    "unique_id": "ada",
                    "authentication_provider_id": 3,
                    "password": "s3cret"
                },
                "communication_channel": {"type": "mail", "address": "ada@example.edu"}
            })
        );
        assert_eq!(
            draft.memberships().add,
            vec![(MembershipRole::Student, vec![10, 11])]
        );
    }

    #[test]
    fn test_delta_routes_by_destination() {
        let mut delta = AttributeDelta::new();
        delta
            .replace("full_name", "Ada King")
            .replace(ENABLE_ATTRIBUTE, false)
            .replace("student_course_ids", vec!["1", "2"])
            .add("teacher_course_ids", vec!["9"])
            .remove("short_name", "Ada");

        let changes = ObjectChanges::from_delta(CanvasObjectClass::User, &delta).unwrap();

        assert_eq!(changes.profile.get("name"), Some(&json!("Ada King")));
        assert_eq!(changes.profile.get("short_name"), Some(&Value::Null));
        assert_eq!(changes.login.enabled, Some(false));
        assert!(changes.login.password.is_none());
        assert_eq!(
            changes.memberships.replace,
            vec![(MembershipRole::Student, vec![1, 2])]
        );
        assert_eq!(changes.memberships.add, vec![(MembershipRole::Teacher, vec![9])]);
        assert!(changes.memberships.remove.is_empty());
    }

    #[test]
    fn test_replace_shadows_add_and_remove() {
        let mut delta = AttributeDelta::new();
        delta
            .replace("student_course_ids", vec!["1"])
            .add("student_course_ids", vec!["2"])
            .remove("student_course_ids", vec!["3"]);

        let changes = ObjectChanges::from_delta(CanvasObjectClass::User, &delta).unwrap();
        assert_eq!(changes.memberships.replace.len(), 1);
        assert!(changes.memberships.add.is_empty());
        assert!(changes.memberships.remove.is_empty());
    }

    #[test]
    fn test_clear_membership_is_empty_replace() {
        let mut delta = AttributeDelta::new();
        delta.clear_attribute("teacher_ids");

        let changes = ObjectChanges::from_delta(CanvasObjectClass::Course, &delta).unwrap();
        assert_eq!(
            changes.memberships.replace,
            vec![(MembershipRole::Teacher, vec![])]
        );
    }

    #[test]
    fn test_course_rejects_non_membership_writes() {
        let mut delta = AttributeDelta::new();
        delta.replace("course_code", "NEW");
        assert!(matches!(
            ObjectChanges::from_delta(CanvasObjectClass::Course, &delta),
            Err(ConnectorError::AttributeNotWritable { .. })
        ));
    }

    #[test]
    fn test_login_clearing_rules() {
        let mut delta = AttributeDelta::new();
        delta.clear_attribute("authentication_provider_id");
        let changes = ObjectChanges::from_delta(CanvasObjectClass::User, &delta).unwrap();
        assert_eq!(changes.login.authentication_provider_id, Some(None));
        assert_eq!(
            changes.login.body(),
            json!({"login": {"authentication_provider_id": null}})
        );

        let mut delta = AttributeDelta::new();
        delta.clear_attribute(NAME_ATTRIBUTE);
        assert!(ObjectChanges::from_delta(CanvasObjectClass::User, &delta).is_err());
    }

    #[test]
    fn test_password_kept_out_of_login_body() {
        let patch = LoginPatch {
            unique_id: Some("ada2".to_string()),
            enabled: Some(true),
            password: Some("pw".to_string()),
            ..LoginPatch::default()
        };
        assert!(patch.has_non_password_changes());
        assert_eq!(
            patch.body(),
            json!({"login": {"unique_id": "ada2", "workflow_state": "active"}})
        );
        assert_eq!(
            patch.password_body(),
            Some(json!({"login": {"password": "pw"}}))
        );
    }

    #[test]
    fn test_multiple_values_for_single_valued_rejected() {
        let mut delta = AttributeDelta::new();
        delta.replace("email", vec!["a@x.test", "b@x.test"]);
        assert!(ObjectChanges::from_delta(CanvasObjectClass::User, &delta).is_err());
    }
}
