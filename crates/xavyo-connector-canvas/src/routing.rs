//! Attribute routing table
//!
//! Every attribute the connector knows is declared once here, together with
//! the Canvas call that writes it. Update handling, create payloads and the
//! published schema all read from these tables.

use xavyo_connector::error::{ConnectorError, ConnectorResult};
use xavyo_connector::operation::{
    ENABLE_ATTRIBUTE, NAME_ATTRIBUTE, PASSWORD_ATTRIBUTE, UID_ATTRIBUTE,
};
use xavyo_connector::schema::AttributeDataType;

use crate::enrollment::MembershipRole;

/// Object classes exposed by the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanvasObjectClass {
    User,
    Course,
}

impl CanvasObjectClass {
    /// Resolve an object class name or one of its aliases.
    pub fn parse(name: &str) -> ConnectorResult<Self> {
        match name.to_lowercase().as_str() {
            "user" | "users" | "account" | "__account__" => Ok(CanvasObjectClass::User),
            "course" | "courses" | "group" | "__group__" => Ok(CanvasObjectClass::Course),
            _ => Err(ConnectorError::ObjectClassNotFound {
                object_class: name.to_string(),
            }),
        }
    }

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            CanvasObjectClass::User => "user",
            CanvasObjectClass::Course => "course",
        }
    }

    /// Attributes of this object class.
    pub fn attributes(&self) -> &'static [AttributeRoute] {
        match self {
            CanvasObjectClass::User => USER_ATTRIBUTES,
            CanvasObjectClass::Course => COURSE_ATTRIBUTES,
        }
    }

    /// Look up an attribute by name.
    pub fn route(&self, name: &str) -> ConnectorResult<&'static AttributeRoute> {
        self.attributes()
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| ConnectorError::AttributeNotFound {
                attribute: name.to_string(),
                object_class: self.name().to_string(),
            })
    }

    /// Look up an attribute that the caller intends to write.
    pub fn writable_route(&self, name: &str) -> ConnectorResult<&'static AttributeRoute> {
        let route = self.route(name)?;
        if route.is_writable() {
            Ok(route)
        } else {
            Err(ConnectorError::AttributeNotWritable {
                attribute: name.to_string(),
                object_class: self.name().to_string(),
            })
        }
    }
}

impl std::fmt::Display for CanvasObjectClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fields of the login sub-record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    UniqueId,
    AuthenticationProvider,
    Enabled,
    Password,
}

/// Where writes to an attribute go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The object id; never written.
    Identifier,
    /// Computed or owned by Canvas; never written.
    ReadOnly,
    /// A property of the user profile patch, by REST name.
    Profile(&'static str),
    /// A property of the login patch.
    Login(LoginField),
    /// A membership set maintained through enrollments.
    Membership(MembershipRole),
}

/// Declaration of one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeRoute {
    pub name: &'static str,
    pub native_name: &'static str,
    pub data_type: AttributeDataType,
    pub route: Route,
    pub required: bool,
}

impl AttributeRoute {
    const fn optional(
        name: &'static str,
        native_name: &'static str,
        data_type: AttributeDataType,
        route: Route,
    ) -> Self {
        Self {
            name,
            native_name,
            data_type,
            route,
            required: false,
        }
    }

    const fn required(
        name: &'static str,
        native_name: &'static str,
        data_type: AttributeDataType,
        route: Route,
    ) -> Self {
        Self {
            name,
            native_name,
            data_type,
            route,
            required: true,
        }
    }

    /// Whether callers may write this attribute.
    pub fn is_writable(&self) -> bool {
        !matches!(self.route, Route::Identifier | Route::ReadOnly)
    }

    /// Whether the attribute holds a set of ids.
    pub fn is_membership(&self) -> bool {
        matches!(self.route, Route::Membership(_))
    }

    /// Whether the attribute is never returned.
    pub fn is_write_only(&self) -> bool {
        self.route == Route::Login(LoginField::Password)
    }
}

/// User attributes.
pub const USER_ATTRIBUTES: &[AttributeRoute] = &[
    AttributeRoute::optional(UID_ATTRIBUTE, "id", AttributeDataType::String, Route::Identifier),
    AttributeRoute::required(
        NAME_ATTRIBUTE,
        "login_id",
        AttributeDataType::String,
        Route::Login(LoginField::UniqueId),
    ),
    AttributeRoute::required(
        "full_name",
        "name",
        AttributeDataType::String,
        Route::Profile("name"),
    ),
    AttributeRoute::optional(
        "created_at",
        "created_at",
        AttributeDataType::DateTime,
        Route::ReadOnly,
    ),
    AttributeRoute::optional(
        "email",
        "email",
        AttributeDataType::String,
        Route::Profile("email"),
    ),
    AttributeRoute::optional(
        "sortable_name",
        "sortable_name",
        AttributeDataType::String,
        Route::ReadOnly,
    ),
    AttributeRoute::optional(
        "short_name",
        "short_name",
        AttributeDataType::String,
        Route::Profile("short_name"),
    ),
    AttributeRoute::optional(
        "authentication_provider_id",
        "authentication_provider_id",
        AttributeDataType::Integer,
        Route::Login(LoginField::AuthenticationProvider),
    ),
    AttributeRoute::optional(
        ENABLE_ATTRIBUTE,
        "workflow_state",
        AttributeDataType::Boolean,
        Route::Login(LoginField::Enabled),
    ),
    AttributeRoute::optional(
        PASSWORD_ATTRIBUTE,
        "password",
        AttributeDataType::GuardedString,
        Route::Login(LoginField::Password),
    ),
    AttributeRoute::optional(
        "student_course_ids",
        "student_course_ids",
        AttributeDataType::String,
        Route::Membership(MembershipRole::Student),
    ),
    AttributeRoute::optional(
        "teacher_course_ids",
        "teacher_course_ids",
        AttributeDataType::String,
        Route::Membership(MembershipRole::Teacher),
    ),
];

/// Course attributes. Only the membership sets are writable.
pub const COURSE_ATTRIBUTES: &[AttributeRoute] = &[
    AttributeRoute::optional(UID_ATTRIBUTE, "id", AttributeDataType::String, Route::Identifier),
    AttributeRoute::optional(NAME_ATTRIBUTE, "name", AttributeDataType::String, Route::ReadOnly),
    AttributeRoute::optional(
        "course_code",
        "course_code",
        AttributeDataType::String,
        Route::ReadOnly,
    ),
    AttributeRoute::optional(
        "workflow_state",
        "workflow_state",
        AttributeDataType::String,
        Route::ReadOnly,
    ),
    AttributeRoute::optional("uuid", "uuid", AttributeDataType::String, Route::ReadOnly),
    AttributeRoute::optional(
        "start_at",
        "start_at",
        AttributeDataType::DateTime,
        Route::ReadOnly,
    ),
    AttributeRoute::optional("end_at", "end_at", AttributeDataType::DateTime, Route::ReadOnly),
    AttributeRoute::optional(
        "is_public",
        "is_public",
        AttributeDataType::Boolean,
        Route::ReadOnly,
    ),
    AttributeRoute::optional(
        "is_public_to_auth_users",
        "is_public_to_auth_users",
        AttributeDataType::Boolean,
        Route::ReadOnly,
    ),
    AttributeRoute::optional(
        "student_ids",
        "student_ids",
        AttributeDataType::String,
        Route::Membership(MembershipRole::Student),
    ),
    AttributeRoute::optional(
        "teacher_ids",
        "teacher_ids",
        AttributeDataType::String,
        Route::Membership(MembershipRole::Teacher),
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_class_aliases() {
        assert_eq!(CanvasObjectClass::parse("user").unwrap(), CanvasObjectClass::User);
        assert_eq!(CanvasObjectClass::parse("__ACCOUNT__").unwrap(), CanvasObjectClass::User);
        assert_eq!(CanvasObjectClass::parse("Courses").unwrap(), CanvasObjectClass::Course);
        assert_eq!(CanvasObjectClass::parse("group").unwrap(), CanvasObjectClass::Course);
        assert!(matches!(
            CanvasObjectClass::parse("section"),
            Err(ConnectorError::ObjectClassNotFound { .. })
        ));
    }

    #[test]
    fn test_user_routes() {
        let user = CanvasObjectClass::User;
        assert_eq!(user.route("full_name").unwrap().route, Route::Profile("name"));
        assert_eq!(
            user.route(NAME_ATTRIBUTE).unwrap().route,
            Route::Login(LoginField::UniqueId)
        );
        assert_eq!(
            user.route("teacher_course_ids").unwrap().route,
            Route::Membership(MembershipRole::Teacher)
        );
        assert!(user.route(PASSWORD_ATTRIBUTE).unwrap().is_write_only());
    }

    #[test]
    fn test_read_only_and_unknown_attributes() {
        let user = CanvasObjectClass::User;
        assert!(matches!(
            user.writable_route("sortable_name"),
            Err(ConnectorError::AttributeNotWritable { .. })
        ));
        assert!(matches!(
            user.writable_route("nickname"),
            Err(ConnectorError::AttributeNotFound { .. })
        ));
        assert!(user.writable_route("email").is_ok());
    }

    #[test]
    fn test_only_memberships_writable_on_courses() {
        let writable: Vec<&str> = COURSE_ATTRIBUTES
            .iter()
            .filter(|a| a.is_writable())
            .map(|a| a.name)
            .collect();
        assert_eq!(writable, vec!["student_ids", "teacher_ids"]);
        assert!(COURSE_ATTRIBUTES
            .iter()
            .filter(|a| a.is_writable())
            .all(AttributeRoute::is_membership));
    }

    #[test]
    fn test_attribute_names_unique() {
        for class in [CanvasObjectClass::User, CanvasObjectClass::Course] {
            let mut names: Vec<&str> = class.attributes().iter().map(|a| a.name).collect();
            let total = names.len();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), total, "duplicate attribute in {class}");
        }
    }
}
