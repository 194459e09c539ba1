use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::debug;
use serde_json::Value as JsonValue;

use crate::reactive::registry::ReactiveRegistry;
use crate::schema::types::Definition;
use crate::schema::SchemaGraph;
use crate::sync::cache::ThingRecord;
use crate::sync::SyncResult;

/// Recomputes locally-derivable fields from their declared dependencies.
///
/// Evaluation walks the thing's dependency-topological order (computed at
/// resolution, which also rejected cycles), so a field is recomputed only
/// after all of its dependencies are current. Never performs network I/O.
pub struct ReactiveEvaluator {
    graph: Arc<SchemaGraph>,
    registry: Arc<ReactiveRegistry>,
}

impl ReactiveEvaluator {
    pub fn new(graph: Arc<SchemaGraph>, registry: Arc<ReactiveRegistry>) -> Self {
        Self { graph, registry }
    }

    pub fn registry(&self) -> &Arc<ReactiveRegistry> {
        &self.registry
    }

    /// Recomputes every reactive field of the record.
    ///
    /// Returns the names of the fields that were recomputed.
    pub fn refresh(&self, record: &mut ThingRecord) -> SyncResult<Vec<String>> {
        self.evaluate(record, None)
    }

    /// Recomputes the reactive fields downstream of the changed fields.
    pub fn react(&self, record: &mut ThingRecord, changed: &[String]) -> SyncResult<Vec<String>> {
        self.evaluate(record, Some(changed))
    }

    fn evaluate(
        &self,
        record: &mut ThingRecord,
        changed: Option<&[String]>,
    ) -> SyncResult<Vec<String>> {
        let thing = match self.graph.find(&record.thing) {
            Some(Definition::Thing(thing)) => thing,
            // A record for a definition this graph does not know carries
            // nothing to derive.
            _ => return Ok(Vec::new()),
        };

        let mut dirty: HashSet<&str> = changed
            .map(|fields| fields.iter().map(String::as_str).collect())
            .unwrap_or_default();
        let mut recomputed = Vec::new();

        for field_name in &thing.reactive_order {
            let field = &thing.fields[field_name];
            let triggered = match changed {
                None => true,
                Some(_) => field
                    .reactive_to
                    .iter()
                    .any(|dep| dirty.contains(dep.as_str())),
            };
            if !triggered {
                continue;
            }
            dirty.insert(field_name);

            let compute = match self.registry.get(&record.thing, field_name) {
                Some(compute) => compute,
                None => continue,
            };
            let mut inputs = HashMap::with_capacity(field.reactive_to.len());
            for dep in &field.reactive_to {
                inputs.insert(
                    dep.clone(),
                    record.fields.get(dep).cloned().unwrap_or(JsonValue::Null),
                );
            }
            let value = compute(&inputs)?;
            record.fields.insert(field_name.clone(), value);
            recomputed.push(field_name.clone());
        }

        if !recomputed.is_empty() {
            debug!(
                "Recomputed {} reactive field(s) on {}:{}",
                recomputed.len(),
                record.thing,
                record.key
            );
        }
        Ok(recomputed)
    }
}
