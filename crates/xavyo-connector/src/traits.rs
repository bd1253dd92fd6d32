//! Connector capability traits
//!
//! Capability-based trait definitions for connectors, inspired by `ConnId`.

use async_trait::async_trait;

use crate::error::{ConnectorError, ConnectorResult};
use crate::operation::{AttributeDelta, AttributeSet, Filter, PageRequest, SearchResult, Uid};
use crate::schema::Schema;

/// Base trait for all connectors.
///
/// This trait provides common functionality that all connectors must implement,
/// regardless of their specific capabilities.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Get the display name for this connector instance.
    fn display_name(&self) -> &str;

    /// Test the connection to the target system.
    ///
    /// Returns `Ok(())` if the connection is successful, or an error describing
    /// what went wrong.
    async fn test_connection(&self) -> ConnectorResult<()>;

    /// Dispose of connector resources.
    ///
    /// Calls made after disposal fail.
    async fn dispose(&self) -> ConnectorResult<()>;
}

/// Capability for describing the schema of a target system.
#[async_trait]
pub trait SchemaDiscovery: Connector {
    /// Describe the object classes and attributes this connector manages.
    async fn discover_schema(&self) -> ConnectorResult<Schema>;

    /// Check if a specific object class exists in the target system.
    async fn has_object_class(&self, object_class: &str) -> ConnectorResult<bool> {
        let schema = self.discover_schema().await?;
        Ok(schema.get_object_class(object_class).is_some())
    }
}

/// Capability for creating objects in the target system.
#[async_trait]
pub trait CreateOp: Connector {
    /// Create a new object in the target system.
    ///
    /// # Arguments
    /// * `object_class` - The type of object to create (e.g., "user")
    /// * `attributes` - The attributes for the new object
    ///
    /// # Returns
    /// The unique identifier (UID) of the created object in the target system.
    async fn create(&self, object_class: &str, attributes: AttributeSet) -> ConnectorResult<Uid>;
}

/// Capability for updating objects in the target system.
#[async_trait]
pub trait UpdateOp: Connector {
    /// Update an existing object in the target system.
    ///
    /// # Arguments
    /// * `object_class` - The type of object to update
    /// * `uid` - The unique identifier of the object in the target system
    /// * `changes` - The attribute changes to apply
    ///
    /// # Returns
    /// The UID of the updated object.
    async fn update(
        &self,
        object_class: &str,
        uid: &Uid,
        changes: AttributeDelta,
    ) -> ConnectorResult<Uid>;
}

/// Capability for deleting objects from the target system.
#[async_trait]
pub trait DeleteOp: Connector {
    /// Delete an object from the target system.
    async fn delete(&self, object_class: &str, uid: &Uid) -> ConnectorResult<()>;
}

/// Capability for searching objects in the target system.
#[async_trait]
pub trait SearchOp: Connector {
    /// Search for objects in the target system.
    ///
    /// # Arguments
    /// * `object_class` - The type of objects to search for
    /// * `filter` - The search filter to apply
    /// * `attributes_to_get` - Optional list of attributes to retrieve
    /// * `page_request` - Optional pagination parameters
    async fn search(
        &self,
        object_class: &str,
        filter: Option<Filter>,
        attributes_to_get: Option<Vec<String>>,
        page_request: Option<PageRequest>,
    ) -> ConnectorResult<SearchResult>;

    /// Get a single object by its UID.
    ///
    /// A missing object yields `Ok(None)` rather than an error.
    async fn get(
        &self,
        object_class: &str,
        uid: &Uid,
        attributes_to_get: Option<Vec<String>>,
    ) -> ConnectorResult<Option<AttributeSet>> {
        let filter = Filter::Equals {
            attribute: uid.attribute_name().to_string(),
            value: uid.value().to_string(),
        };

        match self
            .search(object_class, Some(filter), attributes_to_get, None)
            .await
        {
            Ok(result) => Ok(result.objects.into_iter().next()),
            Err(ConnectorError::ObjectNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Marker trait for connectors that support all CRUD operations.
pub trait FullCrud: CreateOp + UpdateOp + DeleteOp + SearchOp {}

// Blanket implementation for any connector that implements all CRUD ops
impl<T> FullCrud for T where T: CreateOp + UpdateOp + DeleteOp + SearchOp {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ObjectClass;
    use std::sync::Mutex;

    /// In-memory connector keyed by uid.
    struct MemoryConnector {
        objects: Mutex<Vec<AttributeSet>>,
    }

    #[async_trait]
    impl Connector for MemoryConnector {
        fn display_name(&self) -> &str {
            "memory"
        }

        async fn test_connection(&self) -> ConnectorResult<()> {
            Ok(())
        }

        async fn dispose(&self) -> ConnectorResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl SchemaDiscovery for MemoryConnector {
        async fn discover_schema(&self) -> ConnectorResult<Schema> {
            Ok(Schema::with_object_classes(vec![ObjectClass::new(
                "user", "users",
            )]))
        }
    }

    #[async_trait]
    impl SearchOp for MemoryConnector {
        async fn search(
            &self,
            _object_class: &str,
            filter: Option<Filter>,
            _attributes_to_get: Option<Vec<String>>,
            _page_request: Option<PageRequest>,
        ) -> ConnectorResult<SearchResult> {
            let Some(Filter::Equals { value, .. }) = filter else {
                return Err(ConnectorError::UnsupportedFilter {
                    message: "only equality".to_string(),
                });
            };
            let objects = self.objects.lock().unwrap();
            objects
                .iter()
                .find(|o| o.get_string("__uid__") == Some(value.as_str()))
                .map(|o| SearchResult::new(vec![o.clone()]))
                .ok_or_else(|| ConnectorError::not_found(value))
        }
    }

    fn connector() -> MemoryConnector {
        MemoryConnector {
            objects: Mutex::new(vec![AttributeSet::new().with("__uid__", "1")]),
        }
    }

    #[tokio::test]
    async fn test_get_maps_not_found_to_none() {
        let c = connector();
        assert!(c
            .get("user", &Uid::from_value("1"), None)
            .await
            .unwrap()
            .is_some());
        assert!(c
            .get("user", &Uid::from_value("2"), None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_has_object_class() {
        let c = connector();
        assert!(c.has_object_class("user").await.unwrap());
        assert!(!c.has_object_class("course").await.unwrap());
    }
}
