//! Canvas records to connector objects.

use xavyo_connector::operation::{
    AttributeSet, AttributeValue, ENABLE_ATTRIBUTE, NAME_ATTRIBUTE, UID_ATTRIBUTE,
};

use crate::enrollment::{AnchoredEnrollments, MembershipRole};
use crate::model::{CourseRecord, LoginRecord, UserRecord};

/// The login of `logins` that belongs to `account_id`.
pub fn account_login(logins: &[LoginRecord], account_id: u64) -> Option<&LoginRecord> {
    logins.iter().find(|login| login.account_id == account_id)
}

fn set_optional(attrs: &mut AttributeSet, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        attrs.set(name, value);
    }
}

/// Build a user object.
///
/// `login_id` is the naming attribute; callers treat a user without one as
/// deleted and never map it.
pub fn user_to_attributes(
    user: &UserRecord,
    login_id: &str,
    login: Option<&LoginRecord>,
    enrollments: &AnchoredEnrollments,
) -> AttributeSet {
    let mut attrs = AttributeSet::new()
        .with(UID_ATTRIBUTE, user.id.to_string())
        .with(NAME_ATTRIBUTE, login_id);

    set_optional(&mut attrs, "full_name", user.name.as_deref());
    set_optional(&mut attrs, "email", user.email.as_deref());
    set_optional(&mut attrs, "short_name", user.short_name.as_deref());
    set_optional(&mut attrs, "sortable_name", user.sortable_name.as_deref());
    if let Some(created_at) = user.created_at {
        attrs.set("created_at", created_at.to_rfc3339());
    }

    if let Some(login) = login {
        attrs.set(ENABLE_ATTRIBUTE, login.is_active());
        if let Some(provider) = login.authentication_provider_id {
            let value = provider
                .and_then(|id| i64::try_from(id).ok())
                .map_or(AttributeValue::Null, AttributeValue::Integer);
            attrs.set("authentication_provider_id", value);
        }
    }

    attrs.set(
        "student_course_ids",
        enrollments.current_ids(MembershipRole::Student),
    );
    attrs.set(
        "teacher_course_ids",
        enrollments.current_ids(MembershipRole::Teacher),
    );
    attrs
}

/// Build a course object.
pub fn course_to_attributes(course: &CourseRecord, enrollments: &AnchoredEnrollments) -> AttributeSet {
    let mut attrs = AttributeSet::new().with(UID_ATTRIBUTE, course.id.to_string());

    set_optional(&mut attrs, NAME_ATTRIBUTE, course.name.as_deref());
    set_optional(&mut attrs, "course_code", course.course_code.as_deref());
    set_optional(&mut attrs, "workflow_state", course.workflow_state.as_deref());
    set_optional(&mut attrs, "uuid", course.uuid.as_deref());
    set_optional(&mut attrs, "start_at", course.start_at.as_deref());
    set_optional(&mut attrs, "end_at", course.end_at.as_deref());
    if let Some(is_public) = course.is_public {
        attrs.set("is_public", is_public);
    }
    if let Some(is_public) = course.is_public_to_auth_users {
        attrs.set("is_public_to_auth_users", is_public);
    }

    attrs.set("student_ids", enrollments.current_ids(MembershipRole::Student));
    attrs.set("teacher_ids", enrollments.current_ids(MembershipRole::Teacher));
    attrs
}
