//! # Canvas Connector
//!
//! Canvas LMS connector for xavyo provisioning.
//!
//! Manages the users of one Canvas account and the student and teacher
//! memberships of its courses. Canvas has no membership attribute: both
//! sides of the relation are derived from enrollment records, and every
//! membership change is reconciled into enrollment creations and
//! deactivations.
//!
//! ## Features
//!
//! - User create, read, update and delete, including the account login
//! - Read-only courses whose `student_ids` and `teacher_ids` are writable
//! - Enrollment reconciliation for replace, add and remove deltas
//! - `Link` header pagination with offset-based paging for callers
//!
//! ## Example
//!
//! ```ignore
//! use xavyo_connector::prelude::*;
//! use xavyo_connector_canvas::{CanvasConfig, CanvasConnector};
//!
//! let config = CanvasConfig::new("https://school.instructure.com", "token", 1, 3, 4)
//!     .with_enrollment_notification(false);
//!
//! let connector = CanvasConnector::new(config)?;
//! connector.test_connection().await?;
//!
//! let mut delta = AttributeDelta::new();
//! delta.replace("student_course_ids", vec!["101", "102"]);
//! connector.update("user", &Uid::from_value("42"), delta).await?;
//! ```

pub mod client;
pub mod config;
pub mod connector;
pub mod enrollment;
pub mod mapper;
pub mod model;
pub mod pagination;
pub mod payload;
pub mod routing;
pub mod schema;

// Re-exports
pub use config::CanvasConfig;
pub use connector::{CanvasConnector, LISTING_MAX_PAGES, LOGIN_SCAN_MAX_PAGES};
pub use enrollment::{
    Anchor, AnchoredEnrollments, EnrollmentAction, EnrollmentEngine, MembershipChanges,
    MembershipRole, ENROLLMENT_MAX_PAGES,
};
pub use routing::CanvasObjectClass;
