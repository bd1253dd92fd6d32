//! Published schema, derived from the routing tables.

use xavyo_connector::schema::{ObjectClass, Schema, SchemaAttribute};

use crate::routing::{AttributeRoute, CanvasObjectClass};

fn schema_attribute(route: &AttributeRoute, memberships_by_default: bool) -> SchemaAttribute {
    let mut attribute = SchemaAttribute::new(route.name, route.native_name, route.data_type);
    if route.required {
        attribute = attribute.required();
    }
    if route.is_membership() {
        attribute = attribute
            .multi_valued()
            .returned_by_default(memberships_by_default);
    }
    if !route.is_writable() {
        attribute = attribute.read_only();
    }
    if route.is_write_only() {
        attribute = attribute.write_only();
    }
    attribute
}

/// Build the schema. `course_ids_on_users` controls whether user course id
/// sets are flagged as returned by default.
pub fn build_schema(course_ids_on_users: bool) -> Schema {
    let user = CanvasObjectClass::User.attributes().iter().fold(
        ObjectClass::new(CanvasObjectClass::User.name(), "users")
            .with_description("Canvas user with its login in the managed account"),
        |oc, route| oc.with_attribute(schema_attribute(route, course_ids_on_users)),
    );

    let course = CanvasObjectClass::Course
        .attributes()
        .iter()
        .fold(
            ObjectClass::new(CanvasObjectClass::Course.name(), "courses")
                .with_description("Canvas course; only its memberships are writable"),
            |oc, route| oc.with_attribute(schema_attribute(route, true)),
        )
        .without_create_delete();

    Schema::with_object_classes(vec![user, course])
}
