//! Module export namespaces.
//!
//! Exports are opaque to the loader. A [`Namespace`] is a live binding
//! table: importers hold the same `Rc` the module writes into, so later
//! assignments are visible to them. Identity is `Rc::ptr_eq`.

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A single exported value.
pub type ExportValue = Rc<dyn Any>;

/// Shared handle to a module's exports.
pub type Exports = Rc<Namespace>;

/// Live export bindings of one module.
#[derive(Default)]
pub struct Namespace {
    bindings: RefCell<BTreeMap<String, ExportValue>>,
}

impl Namespace {
    /// Create an empty, shared namespace.
    #[must_use]
    pub fn new() -> Exports {
        Rc::new(Self::default())
    }

    /// Bind `name` to a new value.
    pub fn set<T: Any>(&self, name: impl Into<String>, value: T) {
        self.set_value(name, Rc::new(value));
    }

    /// Bind `name` to an existing shared value, e.g. another module's namespace.
    pub fn set_value(&self, name: impl Into<String>, value: ExportValue) {
        self.bindings.borrow_mut().insert(name.into(), value);
    }

    #[must_use]
    pub fn get_value(&self, name: &str) -> Option<ExportValue> {
        self.bindings.borrow().get(name).cloned()
    }

    /// Typed access. `None` if the binding is missing or holds another type.
    #[must_use]
    pub fn get<T: Any>(&self, name: &str) -> Option<Rc<T>> {
        self.get_value(name)?.downcast::<T>().ok()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    /// Bound names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.bindings.borrow().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.borrow().is_empty()
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let ns = Namespace::new();
        ns.set("value", 42_i64);
        ns.set("label", "story".to_string());

        assert_eq!(ns.get::<i64>("value").as_deref(), Some(&42));
        assert_eq!(ns.get::<String>("label").as_deref().map(String::as_str), Some("story"));
        assert!(ns.get::<i32>("value").is_none());
        assert!(ns.get::<i64>("missing").is_none());
        assert_eq!(ns.names(), vec!["label".to_string(), "value".to_string()]);
    }

    #[test]
    fn test_nested_namespace_keeps_identity() {
        let inner = Namespace::new();
        let outer = Namespace::new();
        outer.set_value("inner", inner.clone());

        let seen = outer.get::<Namespace>("inner").unwrap();
        assert!(Rc::ptr_eq(&seen, &inner));

        inner.set("late", 1_u8);
        assert!(seen.contains("late"));
    }

    #[test]
    fn test_debug_lists_names() {
        let ns = Namespace::new();
        ns.set("a", ());
        assert_eq!(format!("{ns:?}"), r#"Namespace { names: ["a"] }"#);
        assert_eq!(ns.len(), 1);
        assert!(!ns.is_empty());
    }
}
