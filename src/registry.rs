//! The factory registry: tag-dispatched deserialization of past-tense trees.
//!
//! A process-wide map from a primitive's string tag to its fragment
//! deserializer, seeded with every built-in the first time it is touched.
//! Custom primitives may be registered before any reading happens;
//! re-registering a tag with a different function is rejected.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;
use serde_json::Value;

use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::{builtin_factories, Aggregated};

/// Deserializes one primitive's fragment (the `"data"` payload, without the
/// `"type"` wrapper). The second argument is a quantity name recorded by the
/// parent, re-attached when the fragment itself has none.
pub type Deserializer = fn(&Value, Option<&str>) -> HgResult<Aggregated>;

static REGISTRY: OnceLock<RwLock<HashMap<String, Deserializer>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<String, Deserializer>> {
    REGISTRY.get_or_init(|| {
        let mut map: HashMap<String, Deserializer> = HashMap::new();
        for (tag, deserializer) in builtin_factories() {
            map.insert(tag.to_string(), deserializer);
        }
        debug!("factory registry seeded with {} built-in types", map.len());
        RwLock::new(map)
    })
}

fn read_registry() -> RwLockReadGuard<'static, HashMap<String, Deserializer>> {
    match registry().read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_registry() -> RwLockWriteGuard<'static, HashMap<String, Deserializer>> {
    match registry().write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// The registry's public face.
pub struct Factory;

impl Factory {
    /// Register a deserializer under a tag. Registering the same function
    /// twice is a no-op; a different function under an existing tag is an
    /// error.
    pub fn register(tag: &str, deserializer: Deserializer) -> HgResult<()> {
        let mut map = write_registry();
        match map.get(tag) {
            Some(existing) if *existing != deserializer => Err(HgError::validation(format!(
                "factory {:?} is already registered with different behavior",
                tag
            ))),
            Some(_) => Ok(()),
            None => {
                debug!("registering custom factory {:?}", tag);
                map.insert(tag.to_string(), deserializer);
                Ok(())
            }
        }
    }

    /// Look up a tag's deserializer.
    pub fn lookup(tag: &str) -> HgResult<Deserializer> {
        read_registry()
            .get(tag)
            .copied()
            .ok_or_else(|| HgError::UnknownType {
                tag: tag.to_string(),
            })
    }

    /// Dispatch one fragment through the registry. Containers use this for
    /// their children.
    pub fn fragment(
        tag: &str,
        value: &Value,
        name_from_parent: Option<&str>,
    ) -> HgResult<Aggregated> {
        Self::lookup(tag)?(value, name_from_parent)
    }

    /// Read a complete `{"type": ..., "data": ...}` document from text.
    pub fn from_json(text: &str) -> HgResult<Aggregated> {
        let value: Value = serde_json::from_str(text).map_err(|e| HgError::InvalidJson {
            message: e.to_string(),
        })?;
        Self::from_json_value(&value)
    }

    /// Read a complete document from an already-parsed value.
    pub fn from_json_value(value: &Value) -> HgResult<Aggregated> {
        let obj = json::object(value, "top-level document")?;
        json::check_keys(obj, &["type", "data"], &[], "top-level document")?;
        let tag = json::get_str(obj, "type", "top-level document")?;
        debug!("decoding aggregator of type {:?}", tag);
        Self::fragment(tag, json::get(obj, "data", "top-level document")?, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_builtin_is_registered() {
        for (tag, _) in builtin_factories() {
            assert!(Factory::lookup(tag).is_ok(), "missing builtin {:?}", tag);
        }
    }

    #[test]
    fn unknown_tags_and_malformed_documents_are_rejected() {
        assert!(matches!(
            Factory::lookup("NoSuchAggregator"),
            Err(HgError::UnknownType { .. })
        ));
        assert!(matches!(
            Factory::from_json("not json at all"),
            Err(HgError::InvalidJson { .. })
        ));
        assert!(matches!(
            Factory::from_json_value(&json!({"type": "Count"})),
            Err(HgError::JsonFormat { .. })
        ));
        assert!(matches!(
            Factory::from_json_value(&json!({"type": "Count", "data": 1.0, "extra": 0})),
            Err(HgError::JsonFormat { .. })
        ));
    }

    #[test]
    fn reregistering_a_builtin_with_the_same_function_is_a_noop() {
        let (tag, f) = builtin_factories()[0];
        assert!(Factory::register(tag, f).is_ok());
    }

    #[test]
    fn reregistering_with_different_behavior_is_rejected() {
        fn bogus(_: &Value, _: Option<&str>) -> HgResult<Aggregated> {
            Err(HgError::validation("bogus".to_string()))
        }
        assert!(matches!(
            Factory::register("Count", bogus),
            Err(HgError::Validation { .. })
        ));
    }

    #[test]
    fn custom_registration_round_trips_through_lookup() {
        fn alias(value: &Value, name: Option<&str>) -> HgResult<Aggregated> {
            crate::primitives::count::factory(value, name)
        }
        Factory::register("CustomCount", alias).expect("register");
        let decoded = Factory::from_json_value(&json!({"type": "CustomCount", "data": 2.5}))
            .expect("decode");
        assert_eq!(decoded.entries(), 2.5);
    }
}
