use std::sync::Arc;

use log::debug;

use crate::config::RuntimeDefaults;
use crate::schema::graph::SchemaGraph;
use crate::schema::types::{
    Action, Auth, Definition, EnumDef, Remote, SchemaResult, Thing, ThingInterface, ValueDef,
    Variety,
};

/// Read-only indexed view over a resolved schema graph.
///
/// Built once and reused for the process lifetime; code generators and the
/// sync runtime both consume this surface. Every multi-result query is
/// name-sorted so repeated runs over the same schema produce identical
/// listings.
#[derive(Debug, Clone)]
pub struct SchemaCore {
    graph: Arc<SchemaGraph>,
}

impl SchemaCore {
    pub fn new(graph: Arc<SchemaGraph>) -> Self {
        debug!(
            "Schema core ready for '{}' ({} definitions)",
            graph.name(),
            graph.len()
        );
        Self { graph }
    }

    /// The underlying resolved graph
    pub fn graph(&self) -> &Arc<SchemaGraph> {
        &self.graph
    }

    /// All things, sorted by name
    pub fn things(&self) -> Vec<&Thing> {
        self.graph
            .iter()
            .filter_map(|d| match d {
                Definition::Thing(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    /// All actions, sorted by name
    pub fn actions(&self) -> Vec<&Action> {
        self.graph
            .iter()
            .filter_map(|d| match d {
                Definition::Action(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    /// All values, sorted by name
    pub fn values(&self) -> Vec<&ValueDef> {
        self.graph
            .iter()
            .filter_map(|d| match d {
                Definition::Value(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    /// All enums, sorted by name
    pub fn enums(&self) -> Vec<&EnumDef> {
        self.graph
            .iter()
            .filter_map(|d| match d {
                Definition::Enum(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    /// All remotes, sorted by name
    pub fn remotes(&self) -> Vec<&Remote> {
        self.graph
            .iter()
            .filter_map(|d| match d {
                Definition::Remote(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// All auths, sorted by name
    pub fn auths(&self) -> Vec<&Auth> {
        self.graph
            .iter()
            .filter_map(|d| match d {
                Definition::Auth(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    /// All varieties, sorted by name
    pub fn varieties(&self) -> Vec<&Variety> {
        self.graph
            .iter()
            .filter_map(|d| match d {
                Definition::Variety(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    /// All interfaces, sorted by name
    pub fn interfaces(&self) -> Vec<&ThingInterface> {
        self.graph
            .iter()
            .filter_map(|d| match d {
                Definition::Interface(i) => Some(i),
                _ => None,
            })
            .collect()
    }

    /// All syncables (things and actions), sorted by name
    pub fn syncables(&self) -> Vec<&Definition> {
        self.graph.iter().filter(|d| d.is_syncable()).collect()
    }

    /// The single unscoped base action, if declared
    pub fn base_action(&self) -> Option<&Action> {
        self.actions()
            .into_iter()
            .find(|a| a.base && a.remote.is_none())
    }

    /// Per-remote base action overrides, sorted by the owning remote's name
    pub fn remote_bases(&self) -> Vec<&Action> {
        let mut bases: Vec<(&str, &Action)> = self
            .actions()
            .into_iter()
            .filter_map(|a| {
                a.remote
                    .map(|remote| (self.graph.def(remote).name(), a))
            })
            .collect();
        bases.sort_by_key(|(remote, _)| *remote);
        bases.into_iter().map(|(_, a)| a).collect()
    }

    /// The remote flagged as default, or absent when none is flagged
    pub fn default_remote(&self) -> Option<&Remote> {
        self.remotes().into_iter().find(|r| r.default)
    }

    /// The auth flagged as default, or absent when none is flagged
    pub fn default_auth(&self) -> Option<&Auth> {
        self.auths().into_iter().find(|a| a.default)
    }

    /// Things with at least one reactive field, sorted by name
    pub fn reactives(&self) -> Vec<&Thing> {
        self.things()
            .into_iter()
            .filter(|t| t.is_reactive())
            .collect()
    }

    /// Syncables whose merged endpoint configuration is non-null, sorted by
    /// name
    pub fn endpoints(&self) -> Vec<&Definition> {
        self.syncables()
            .into_iter()
            .filter(|d| d.endpoint().is_some())
            .collect()
    }

    /// Definition by name, failing with `NotFound` when absent
    pub fn get(&self, name: &str) -> SchemaResult<&Definition> {
        self.graph.get(name)
    }

    /// Definition by name, or `None` when absent
    pub fn find(&self, name: &str) -> Option<&Definition> {
        self.graph.find(name)
    }

    /// Thing by name, failing fast with `TypeMismatch` on the wrong kind
    pub fn thing(&self, name: &str) -> SchemaResult<&Thing> {
        self.graph.thing(name)
    }

    /// Action by name, failing fast with `TypeMismatch` on the wrong kind
    pub fn action(&self, name: &str) -> SchemaResult<&Action> {
        self.graph.action(name)
    }

    /// Remote by name, failing fast with `TypeMismatch` on the wrong kind
    pub fn remote(&self, name: &str) -> SchemaResult<&Remote> {
        self.graph.remote(name)
    }

    /// Auth by name, failing fast with `TypeMismatch` on the wrong kind
    pub fn auth(&self, name: &str) -> SchemaResult<&Auth> {
        self.graph.auth(name)
    }

    /// Variety by name, failing fast with `TypeMismatch` on the wrong kind
    pub fn variety(&self, name: &str) -> SchemaResult<&Variety> {
        self.graph.variety(name)
    }

    /// Interface by name, failing fast with `TypeMismatch` on the wrong kind
    pub fn interface(&self, name: &str) -> SchemaResult<&ThingInterface> {
        self.graph.interface(name)
    }

    /// Schema defaults resolved once into an explicit immutable object.
    ///
    /// Threaded through the sync runtime's call sites instead of living in
    /// process-wide mutable state.
    pub fn defaults(&self) -> RuntimeDefaults {
        RuntimeDefaults {
            remote: self.default_remote().map(|r| r.name.clone()),
            auth: self.default_auth().map(|a| a.name.clone()),
        }
    }
}
