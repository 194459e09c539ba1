use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value as JsonValue;

use crate::sync::SyncResult;

/// Callback type computing a reactive field from its dependency values.
///
/// Inputs are keyed by dependency field name; absent dependencies arrive as
/// JSON null.
pub type ComputeFn = Arc<dyn Fn(&HashMap<String, JsonValue>) -> SyncResult<JsonValue> + Send + Sync>;

/// Registry of reactive compute functions, keyed `"Thing.field"`.
///
/// The schema declares which fields are reactive and what they depend on;
/// the compute bodies are registered here at runtime (generated clients
/// register theirs at startup). A reactive field with no registered compute
/// keeps its cached value.
#[derive(Default)]
pub struct ReactiveRegistry {
    computes: RwLock<HashMap<String, ComputeFn>>,
}

impl ReactiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn compute_id(thing: &str, field: &str) -> String {
        format!("{}.{}", thing, field)
    }

    /// Registers the compute function for a thing's reactive field
    pub fn register(
        &self,
        thing: &str,
        field: &str,
        compute: impl Fn(&HashMap<String, JsonValue>) -> SyncResult<JsonValue> + Send + Sync + 'static,
    ) {
        let mut computes = self.computes.write().unwrap();
        computes.insert(Self::compute_id(thing, field), Arc::new(compute));
    }

    /// Whether a compute function is registered for the field
    pub fn compute_exists(&self, thing: &str, field: &str) -> bool {
        let computes = self.computes.read().unwrap();
        computes.contains_key(&Self::compute_id(thing, field))
    }

    pub(crate) fn get(&self, thing: &str, field: &str) -> Option<ComputeFn> {
        let computes = self.computes.read().unwrap();
        computes.get(&Self::compute_id(thing, field)).cloned()
    }
}
