//! Test containers and how they are found
//!
//! A compiled test class becomes runnable through a [`ContainerLoader`].
//! [`ContainerRegistry`] maps class names to containers linked into the
//! binary; the runtime adapter in [`crate::runtime`] launches a JVM instead.

use crate::collector::{Collector, GroupError};
use crate::error::{Result, TestError};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A compiled test unit: one top-level test class file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestUnit {
    /// Project-relative class file path
    pub path: String,
    /// Fully qualified class name
    pub class_name: String,
    /// Project-relative path of the source file that produced it
    pub source: String,
    /// Class file modification time in milliseconds
    pub last_modified: i64,
}

/// Something that registers a tree of tests
pub trait TestContainer: Send + Sync {
    /// Name shown at the root of the report.
    fn name(&self) -> &str;

    /// Register tests and groups against `collector`.
    ///
    /// An error aborts the remaining registration and is reported as a
    /// failure of the container itself.
    fn register(&self, collector: &mut Collector) -> std::result::Result<(), GroupError>;
}

/// Turns a [`TestUnit`] into a [`TestContainer`]
pub trait ContainerLoader {
    /// Load `unit`.
    ///
    /// [`TestError::Load`] means this unit cannot run and is skipped; any
    /// other error stops the test phase.
    fn load(&self, unit: &TestUnit) -> Result<Arc<dyn TestContainer>>;
}

/// Class name to container lookup for containers linked into the binary
#[derive(Default, Clone)]
pub struct ContainerRegistry {
    containers: BTreeMap<String, Arc<dyn TestContainer>>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `container` under a fully qualified class name.
    pub fn register(&mut self, class_name: impl Into<String>, container: Arc<dyn TestContainer>) {
        let _ = self.containers.insert(class_name.into(), container);
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.containers.contains_key(class_name)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

impl ContainerLoader for ContainerRegistry {
    fn load(&self, unit: &TestUnit) -> Result<Arc<dyn TestContainer>> {
        self.containers
            .get(&unit.class_name)
            .cloned()
            .ok_or_else(|| TestError::Load {
                class: unit.class_name.clone(),
                reason: "no test container registered under this name".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Empty;

    impl TestContainer for Empty {
        fn name(&self) -> &str {
            "Empty"
        }
        fn register(&self, _: &mut Collector) -> std::result::Result<(), GroupError> {
            Ok(())
        }
    }

    fn unit(class_name: &str) -> TestUnit {
        TestUnit {
            path: format!("build/classes/test/{}.class", class_name.replace('.', "/")),
            class_name: class_name.into(),
            source: String::new(),
            last_modified: 0,
        }
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = ContainerRegistry::new();
        registry.register("shop.CartTest", Arc::new(Empty));

        assert!(registry.contains("shop.CartTest"));
        assert_eq!(registry.load(&unit("shop.CartTest")).unwrap().name(), "Empty");
        assert!(matches!(
            registry.load(&unit("shop.Missing")),
            Err(TestError::Load { .. })
        ));
    }
}
