//! # Connector Protocol
//!
//! Core abstractions for connecting xavyo to external identity systems.
//!
//! The crate carries no transport of its own: it defines the vocabulary a
//! connector speaks (identifiers, attribute sets, deltas, filters, pages,
//! schema) and the capability traits a connector implements.
//!
//! ## Architecture
//!
//! The framework uses a capability-based trait system inspired by `ConnId`:
//!
//! - [`Connector`] - Base trait all connectors implement
//! - [`SchemaDiscovery`] - Describe the managed object classes
//! - [`CreateOp`], [`UpdateOp`], [`DeleteOp`] - CRUD operations
//! - [`SearchOp`] - Search and retrieve objects
//!
//! ## Example
//!
//! ```ignore
//! use xavyo_connector::prelude::*;
//!
//! connector.test_connection().await?;
//!
//! let attrs = AttributeSet::new()
//!     .with(NAME_ATTRIBUTE, "jdoe")
//!     .with("full_name", "John Doe");
//! let uid = connector.create("user", attrs).await?;
//!
//! let mut delta = AttributeDelta::new();
//! delta.add("student_course_ids", vec!["101"]);
//! connector.update("user", &uid, delta).await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`error`] - Error types with transient/permanent classification
//! - [`traits`] - Connector capability traits
//! - [`schema`] - Schema types (`ObjectClass`, `SchemaAttribute`)
//! - [`operation`] - Operation types (Uid, `AttributeSet`, Filter)
//! - [`config`] - Configuration trait and connection settings
//!
//! [`Connector`]: traits::Connector
//! [`SchemaDiscovery`]: traits::SchemaDiscovery
//! [`CreateOp`]: traits::CreateOp
//! [`UpdateOp`]: traits::UpdateOp
//! [`DeleteOp`]: traits::DeleteOp
//! [`SearchOp`]: traits::SearchOp

pub mod config;
pub mod error;
pub mod operation;
pub mod schema;
pub mod traits;

/// Prelude module for convenient imports.
///
/// ```
/// use xavyo_connector::prelude::*;
/// ```
pub mod prelude {
    // Error handling
    pub use crate::error::{ConnectorError, ConnectorResult};

    // Traits
    pub use crate::traits::{
        Connector, CreateOp, DeleteOp, FullCrud, SchemaDiscovery, SearchOp, UpdateOp,
    };

    // Schema
    pub use crate::schema::{AttributeDataType, ObjectClass, Schema, SchemaAttribute};

    // Operations
    pub use crate::operation::{
        AttributeDelta, AttributeSet, AttributeValue, Filter, PageRequest, SearchResult, Uid,
        ENABLE_ATTRIBUTE, NAME_ATTRIBUTE, PASSWORD_ATTRIBUTE, UID_ATTRIBUTE,
    };

    // Configuration
    pub use crate::config::{ConnectionSettings, ConnectorConfig};
}

// Re-export async_trait for connector implementors
pub use async_trait::async_trait;
