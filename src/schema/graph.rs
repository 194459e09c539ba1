use std::collections::HashMap;

use crate::schema::types::{
    Action, Auth, DefId, Definition, EnumDef, Field, FieldType, Remote, SchemaError, SchemaResult,
    Thing, ThingInterface, ValueDef, Variety,
};

/// A fully linked, immutable schema graph.
///
/// Produced by the resolver and never mutated afterwards; it is shared
/// freely behind an `Arc` without locking. Definitions live in an arena
/// indexed by `DefId`, with a name index for O(1) lookup. No string
/// references remain: every cross-definition edge is a `DefId`.
#[derive(Debug)]
pub struct SchemaGraph {
    name: String,
    defs: Vec<Definition>,
    index: HashMap<String, DefId>,
}

impl SchemaGraph {
    pub(crate) fn new(name: String, defs: Vec<Definition>, index: HashMap<String, DefId>) -> Self {
        Self { name, defs, index }
    }

    /// Name of the schema this graph was resolved from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of definitions in the graph
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Definition behind an identity issued by this graph
    pub fn def(&self, id: DefId) -> &Definition {
        &self.defs[id.index()]
    }

    /// Identity of the definition with the given name, if present
    pub fn lookup(&self, name: &str) -> Option<DefId> {
        self.index.get(name).copied()
    }

    /// Definition with the given name, or `None` when absent
    pub fn find(&self, name: &str) -> Option<&Definition> {
        self.lookup(name).map(|id| self.def(id))
    }

    /// Definition with the given name, failing with `NotFound` when absent
    pub fn get(&self, name: &str) -> SchemaResult<&Definition> {
        self.find(name)
            .ok_or_else(|| SchemaError::NotFound(name.to_string()))
    }

    /// Iterates over all definitions in name-sorted order.
    ///
    /// The resolver allocates identities in name-sorted order, so arena
    /// order is listing order.
    pub fn iter(&self) -> impl Iterator<Item = &Definition> {
        self.defs.iter()
    }

    fn typed<'a, T>(
        &'a self,
        name: &str,
        expected: &'static str,
        select: impl Fn(&'a Definition) -> Option<&'a T>,
    ) -> SchemaResult<&'a T> {
        let def = self.get(name)?;
        select(def).ok_or_else(|| SchemaError::TypeMismatch {
            name: name.to_string(),
            expected,
            found: def.kind(),
        })
    }

    /// Thing with the given name, failing fast on a kind mismatch
    pub fn thing(&self, name: &str) -> SchemaResult<&Thing> {
        self.typed(name, "thing", |d| match d {
            Definition::Thing(t) => Some(t),
            _ => None,
        })
    }

    /// Action with the given name, failing fast on a kind mismatch
    pub fn action(&self, name: &str) -> SchemaResult<&Action> {
        self.typed(name, "action", |d| match d {
            Definition::Action(a) => Some(a),
            _ => None,
        })
    }

    /// Value with the given name, failing fast on a kind mismatch
    pub fn value(&self, name: &str) -> SchemaResult<&ValueDef> {
        self.typed(name, "value", |d| match d {
            Definition::Value(v) => Some(v),
            _ => None,
        })
    }

    /// Enum with the given name, failing fast on a kind mismatch
    pub fn enum_def(&self, name: &str) -> SchemaResult<&EnumDef> {
        self.typed(name, "enum", |d| match d {
            Definition::Enum(e) => Some(e),
            _ => None,
        })
    }

    /// Remote with the given name, failing fast on a kind mismatch
    pub fn remote(&self, name: &str) -> SchemaResult<&Remote> {
        self.typed(name, "remote", |d| match d {
            Definition::Remote(r) => Some(r),
            _ => None,
        })
    }

    /// Auth with the given name, failing fast on a kind mismatch
    pub fn auth(&self, name: &str) -> SchemaResult<&Auth> {
        self.typed(name, "auth", |d| match d {
            Definition::Auth(a) => Some(a),
            _ => None,
        })
    }

    /// Variety with the given name, failing fast on a kind mismatch
    pub fn variety(&self, name: &str) -> SchemaResult<&Variety> {
        self.typed(name, "variety", |d| match d {
            Definition::Variety(v) => Some(v),
            _ => None,
        })
    }

    /// Interface with the given name, failing fast on a kind mismatch
    pub fn interface(&self, name: &str) -> SchemaResult<&ThingInterface> {
        self.typed(name, "interface", |d| match d {
            Definition::Interface(i) => Some(i),
            _ => None,
        })
    }

    /// Field declared by the named thing or action
    pub fn field(&self, owner: &str, field: &str) -> SchemaResult<&Field> {
        let fields = match self.get(owner)? {
            Definition::Thing(t) => &t.fields,
            Definition::Action(a) => &a.fields,
            other => {
                return Err(SchemaError::TypeMismatch {
                    name: owner.to_string(),
                    expected: "thing or action",
                    found: other.kind(),
                })
            }
        };
        fields
            .get(field)
            .ok_or_else(|| SchemaError::NotFound(format!("{}.{}", owner, field)))
    }

    /// The concrete thing set a field type may hold, in name-sorted order.
    ///
    /// Open types answer their conforming (interface) or declared (variety)
    /// member set; a reference to a thing answers that thing alone; value
    /// and enum references answer the empty set; collections answer for
    /// their inner type. The graph is only published after resolution, so
    /// this is always fully defined.
    pub fn compatible(&self, field_type: &FieldType) -> Vec<&Thing> {
        match field_type {
            FieldType::Interface(id) => match self.def(*id) {
                Definition::Interface(i) => self.things_of(&i.conformers),
                _ => Vec::new(),
            },
            FieldType::Variety(id) => match self.def(*id) {
                Definition::Variety(v) => self.things_of(&v.members),
                _ => Vec::new(),
            },
            FieldType::Reference(id) => match self.def(*id) {
                Definition::Thing(t) => vec![t],
                _ => Vec::new(),
            },
            FieldType::List(inner) | FieldType::Map(inner) => self.compatible(inner),
        }
    }

    fn things_of(&self, ids: &[DefId]) -> Vec<&Thing> {
        ids.iter()
            .filter_map(|id| match self.def(*id) {
                Definition::Thing(t) => Some(t),
                _ => None,
            })
            .collect()
    }
}
