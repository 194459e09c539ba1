use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, info};

use crate::schema::graph::SchemaGraph;
use crate::schema::types::{
    Action, Auth, DefId, Definition, EndpointConfig, EnumDef, Field, FieldType, JsonAction,
    JsonEndpoint, JsonField, JsonFieldType, JsonSchemaDefinition, JsonThing, Remote, SchemaError,
    SchemaResult, Thing, ThingInterface, ValueDef, Variety,
};

/// Resolves a raw, name-referencing schema into an immutable linked graph.
///
/// Resolution is a two-phase build: first every declared name is allocated a
/// stable identity, then all references are linked against that identity
/// table. Forward and circular references between things are supported by
/// construction. Any validation failure aborts the run; no partial graph is
/// ever published.
///
/// Resolution is deterministic: identities are allocated in name-sorted
/// order and every derived set is stored sorted, so identical raw input
/// always yields identical listings and identical compatible sets.
pub fn resolve(raw: &JsonSchemaDefinition) -> SchemaResult<SchemaGraph> {
    let mut resolver = Resolver::new(raw);
    resolver.allocate()?;
    let graph = resolver.link()?;
    info!(
        "Resolved schema '{}' with {} definitions",
        graph.name(),
        graph.len()
    );
    Ok(graph)
}

/// Category of a declared name, fixed during allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Thing,
    Action,
    Value,
    Enum,
    Remote,
    Auth,
    Variety,
    Interface,
}

struct Resolver<'a> {
    raw: &'a JsonSchemaDefinition,
    index: HashMap<String, DefId>,
    /// Declared names with their categories, in arena (name-sorted) order
    arena: Vec<(String, Category)>,
}

impl<'a> Resolver<'a> {
    fn new(raw: &'a JsonSchemaDefinition) -> Self {
        Self {
            raw,
            index: HashMap::new(),
            arena: Vec::new(),
        }
    }

    /// Phase one: allocate a stable identity for every declared name.
    ///
    /// Names are unique across all categories of a schema.
    fn allocate(&mut self) -> SchemaResult<()> {
        let mut declared: Vec<(String, Category)> = Vec::new();
        declared.extend(keys_of(&self.raw.things, Category::Thing));
        declared.extend(keys_of(&self.raw.actions, Category::Action));
        declared.extend(keys_of(&self.raw.values, Category::Value));
        declared.extend(keys_of(&self.raw.enums, Category::Enum));
        declared.extend(keys_of(&self.raw.remotes, Category::Remote));
        declared.extend(keys_of(&self.raw.auths, Category::Auth));
        declared.extend(keys_of(&self.raw.varieties, Category::Variety));
        declared.extend(keys_of(&self.raw.interfaces, Category::Interface));
        declared.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, category) in declared {
            let id = DefId(self.arena.len());
            if self.index.insert(name.clone(), id).is_some() {
                return Err(SchemaError::DuplicateName(name));
            }
            self.arena.push((name, category));
        }
        debug!("Allocated {} definition identities", self.arena.len());
        Ok(())
    }

    /// Phase two: link every reference through the identity table and
    /// validate schema invariants.
    fn link(&mut self) -> SchemaResult<SchemaGraph> {
        self.check_defaults()?;
        self.check_base_actions()?;
        let conformers = self.collect_conformers()?;
        let membership = self.collect_variety_membership()?;

        let mut defs = Vec::with_capacity(self.arena.len());
        for (idx, (name, category)) in self.arena.clone().iter().enumerate() {
            let id = DefId(idx);
            let def = match category {
                Category::Thing => {
                    let raw = &self.raw.things[name];
                    Definition::Thing(self.link_thing(
                        name,
                        raw,
                        membership.get(&id).copied(),
                    )?)
                }
                Category::Action => {
                    let raw = &self.raw.actions[name];
                    Definition::Action(self.link_action(name, raw)?)
                }
                Category::Value => Definition::Value(ValueDef {
                    name: name.clone(),
                    scalar: self.raw.values[name].scalar,
                }),
                Category::Enum => {
                    let raw = &self.raw.enums[name];
                    let mut seen = HashSet::new();
                    for case in &raw.cases {
                        if !seen.insert(case.as_str()) {
                            return Err(SchemaError::InvalidData(format!(
                                "Enum {} declares case {} twice",
                                name, case
                            )));
                        }
                    }
                    Definition::Enum(EnumDef {
                        name: name.clone(),
                        cases: raw.cases.clone(),
                    })
                }
                Category::Remote => {
                    let raw = &self.raw.remotes[name];
                    Definition::Remote(Remote {
                        name: name.clone(),
                        url: raw.url.clone(),
                        default: raw.default,
                    })
                }
                Category::Auth => {
                    let raw = &self.raw.auths[name];
                    Definition::Auth(Auth {
                        name: name.clone(),
                        scheme: raw.scheme.clone(),
                        default: raw.default,
                    })
                }
                Category::Variety => {
                    let raw = &self.raw.varieties[name];
                    let mut members = Vec::with_capacity(raw.members.len());
                    for member in sorted(&raw.members) {
                        members.push(self.expect(member, Category::Thing, "thing")?);
                    }
                    Definition::Variety(Variety {
                        name: name.clone(),
                        members,
                    })
                }
                Category::Interface => {
                    let raw = &self.raw.interfaces[name];
                    Definition::Interface(ThingInterface {
                        name: name.clone(),
                        required_fields: raw.required_fields.clone(),
                        conformers: conformers.get(&id).cloned().unwrap_or_default(),
                    })
                }
            };
            defs.push(def);
        }

        Ok(SchemaGraph::new(
            self.raw.name.clone(),
            defs,
            self.index.clone(),
        ))
    }

    /// Identity of a declared name, or UnresolvedReference
    fn lookup(&self, name: &str) -> SchemaResult<DefId> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::UnresolvedReference(name.to_string()))
    }

    /// Identity of a declared name that must be of the given category
    fn expect(&self, name: &str, category: Category, label: &'static str) -> SchemaResult<DefId> {
        let id = self.lookup(name)?;
        let (_, found) = &self.arena[id.index()];
        if *found != category {
            return Err(SchemaError::TypeMismatch {
                name: name.to_string(),
                expected: label,
                found: category_label(*found),
            });
        }
        Ok(id)
    }

    /// At most one default remote and one default auth
    fn check_defaults(&self) -> SchemaResult<()> {
        let mut default_remote = None;
        for name in sorted_keys(&self.raw.remotes) {
            if self.raw.remotes[name].default {
                if default_remote.is_some() {
                    return Err(SchemaError::DuplicateDefault {
                        kind: "remote".to_string(),
                        name: name.clone(),
                    });
                }
                default_remote = Some(name);
            }
        }
        let mut default_auth = None;
        for name in sorted_keys(&self.raw.auths) {
            if self.raw.auths[name].default {
                if default_auth.is_some() {
                    return Err(SchemaError::DuplicateDefault {
                        kind: "auth".to_string(),
                        name: name.clone(),
                    });
                }
                default_auth = Some(name);
            }
        }
        Ok(())
    }

    /// One unscoped base action per schema, one base action per remote
    fn check_base_actions(&self) -> SchemaResult<()> {
        let mut unscoped: Option<&String> = None;
        let mut per_remote: HashMap<&str, &String> = HashMap::new();
        for name in sorted_keys(&self.raw.actions) {
            let raw = &self.raw.actions[name];
            match &raw.remote_base_of {
                None => {
                    if raw.base {
                        if unscoped.is_some() {
                            return Err(SchemaError::DuplicateBaseAction(name.clone()));
                        }
                        unscoped = Some(name);
                    }
                }
                Some(remote) => {
                    self.expect(remote, Category::Remote, "remote")?;
                    if per_remote.insert(remote.as_str(), name).is_some() {
                        return Err(SchemaError::DuplicateBaseAction(name.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Interface id -> conforming things, sorted by thing name.
    ///
    /// Also checks that conformers declare every required field of the
    /// contract.
    fn collect_conformers(&self) -> SchemaResult<HashMap<DefId, Vec<DefId>>> {
        let mut conformers: HashMap<DefId, Vec<DefId>> = HashMap::new();
        for thing_name in sorted_keys(&self.raw.things) {
            let raw = &self.raw.things[thing_name];
            let thing_id = self.lookup(thing_name)?;
            for iface_name in &raw.interfaces {
                let iface_id = self.expect(iface_name, Category::Interface, "interface")?;
                for required in &self.raw.interfaces[iface_name].required_fields {
                    if !raw.fields.contains_key(required) {
                        return Err(SchemaError::InvalidField(format!(
                            "Thing {} conforms to {} but does not declare field {}",
                            thing_name, iface_name, required
                        )));
                    }
                }
                let entry = conformers.entry(iface_id).or_default();
                if !entry.contains(&thing_id) {
                    entry.push(thing_id);
                }
            }
        }
        // Thing names were walked sorted, so each conformer list is sorted.
        Ok(conformers)
    }

    /// Thing id -> variety id, from the varieties' declared member lists
    fn collect_variety_membership(&self) -> SchemaResult<HashMap<DefId, DefId>> {
        let mut membership: HashMap<DefId, DefId> = HashMap::new();
        for variety_name in sorted_keys(&self.raw.varieties) {
            let raw = &self.raw.varieties[variety_name];
            let variety_id = self.lookup(variety_name)?;
            for member in &raw.members {
                let member_id = self.expect(member, Category::Thing, "thing")?;
                if membership.insert(member_id, variety_id).is_some() {
                    return Err(SchemaError::InvalidField(format!(
                        "Thing {} is a member of more than one variety",
                        member
                    )));
                }
            }
        }
        Ok(membership)
    }

    fn link_thing(
        &self,
        name: &str,
        raw: &JsonThing,
        variety: Option<DefId>,
    ) -> SchemaResult<Thing> {
        let fields = self.link_fields(name, &raw.fields)?;
        let reactive_order = reactive_topological_order(name, &fields)?;

        let mut interfaces = Vec::with_capacity(raw.interfaces.len());
        for iface in sorted(&raw.interfaces) {
            interfaces.push(self.expect(iface, Category::Interface, "interface")?);
        }

        Ok(Thing {
            name: name.to_string(),
            fields,
            interfaces,
            variety,
            endpoint: self.merge_endpoint(raw.endpoint.as_ref())?,
            reactive_order,
        })
    }

    fn link_action(&self, name: &str, raw: &JsonAction) -> SchemaResult<Action> {
        let remote = match &raw.remote_base_of {
            Some(remote) => Some(self.expect(remote, Category::Remote, "remote")?),
            None => None,
        };
        Ok(Action {
            name: name.to_string(),
            fields: self.link_fields(name, &raw.fields)?,
            base: raw.base || remote.is_some(),
            remote,
            endpoint: self.merge_endpoint(raw.endpoint.as_ref())?,
        })
    }

    fn link_fields(
        &self,
        owner: &str,
        raw: &HashMap<String, JsonField>,
    ) -> SchemaResult<BTreeMap<String, Field>> {
        let mut fields = BTreeMap::new();
        for field_name in sorted_keys(raw) {
            let raw_field = &raw[field_name];
            for dep in &raw_field.reactive_to {
                if !raw.contains_key(dep) {
                    return Err(SchemaError::UnresolvedReference(format!(
                        "{}.{} reacts to unknown field {}",
                        owner, field_name, dep
                    )));
                }
            }
            fields.insert(
                field_name.clone(),
                Field {
                    field_type: self.link_field_type(owner, field_name, &raw_field.field_type)?,
                    nullable: raw_field.nullable,
                    reactive_to: raw_field.reactive_to.clone(),
                },
            );
        }
        Ok(fields)
    }

    fn link_field_type(
        &self,
        owner: &str,
        field: &str,
        raw: &JsonFieldType,
    ) -> SchemaResult<FieldType> {
        match raw {
            JsonFieldType::Reference { target } => {
                let id = self.lookup(target)?;
                let (_, category) = &self.arena[id.index()];
                if !matches!(category, Category::Thing | Category::Value | Category::Enum) {
                    return Err(SchemaError::InvalidField(format!(
                        "{}.{} references {}, which is not a stateful definition",
                        owner, field, target
                    )));
                }
                Ok(FieldType::Reference(id))
            }
            JsonFieldType::Interface { target } => Ok(FieldType::Interface(self.expect(
                target,
                Category::Interface,
                "interface",
            )?)),
            JsonFieldType::Variety { target } => Ok(FieldType::Variety(self.expect(
                target,
                Category::Variety,
                "variety",
            )?)),
            JsonFieldType::List { inner } => {
                let inner = self.link_field_type(owner, field, inner)?;
                if !inner.collection_eligible() {
                    return Err(SchemaError::InvalidField(format!(
                        "{}.{} nests a collection inside a list",
                        owner, field
                    )));
                }
                Ok(FieldType::List(Box::new(inner)))
            }
            JsonFieldType::Map { inner } => {
                let inner = self.link_field_type(owner, field, inner)?;
                if !inner.collection_eligible() {
                    return Err(SchemaError::InvalidField(format!(
                        "{}.{} nests a collection inside a map",
                        owner, field
                    )));
                }
                Ok(FieldType::Map(Box::new(inner)))
            }
        }
    }

    /// Overlay a definition's endpoint onto the schema defaults and check
    /// that the routed names resolve to the right kinds
    fn merge_endpoint(&self, over: Option<&JsonEndpoint>) -> SchemaResult<Option<EndpointConfig>> {
        let base = self.raw.endpoint_defaults.as_ref().map(to_endpoint);
        let over = over.map(to_endpoint);
        let merged = EndpointConfig::merged(base.as_ref(), over.as_ref());
        if let Some(config) = &merged {
            if let Some(remote) = &config.remote {
                self.expect(remote, Category::Remote, "remote")?;
            }
            if let Some(auth) = &config.auth {
                self.expect(auth, Category::Auth, "auth")?;
            }
        }
        Ok(merged)
    }
}

/// Dependency-topological order of a thing's reactive fields.
///
/// Kahn's algorithm over the reactive fields only: a dependency on a
/// non-reactive sibling is always satisfiable and adds no edge. Smallest
/// field name first among ready nodes, so the order is deterministic.
fn reactive_topological_order(
    thing: &str,
    fields: &BTreeMap<String, Field>,
) -> SchemaResult<Vec<String>> {
    let reactive: Vec<&String> = fields
        .iter()
        .filter(|(_, f)| f.is_reactive())
        .map(|(name, _)| name)
        .collect();
    if reactive.is_empty() {
        return Ok(Vec::new());
    }

    let mut remaining: BTreeMap<&str, HashSet<&str>> = BTreeMap::new();
    for name in &reactive {
        let deps = fields[*name]
            .reactive_to
            .iter()
            .filter(|dep| fields[dep.as_str()].is_reactive())
            .map(String::as_str)
            .collect();
        remaining.insert(name.as_str(), deps);
    }

    let mut order = Vec::with_capacity(reactive.len());
    while !remaining.is_empty() {
        let ready = remaining
            .iter()
            .find(|(_, deps)| deps.is_empty())
            .map(|(name, _)| *name);
        match ready {
            Some(name) => {
                remaining.remove(name);
                for deps in remaining.values_mut() {
                    deps.remove(name);
                }
                order.push(name.to_string());
            }
            None => {
                // Every remaining field waits on another remaining field.
                let field = remaining.keys().next().expect("non-empty").to_string();
                return Err(SchemaError::ReactiveDependencyCycle {
                    thing: thing.to_string(),
                    field,
                });
            }
        }
    }
    Ok(order)
}

fn keys_of<T>(map: &HashMap<String, T>, category: Category) -> Vec<(String, Category)> {
    map.keys().map(|k| (k.clone(), category)).collect()
}

fn sorted_keys<T>(map: &HashMap<String, T>) -> Vec<&String> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    keys
}

fn sorted(names: &[String]) -> Vec<&String> {
    let mut names: Vec<&String> = names.iter().collect();
    names.sort();
    names
}

fn to_endpoint(raw: &JsonEndpoint) -> EndpointConfig {
    EndpointConfig {
        path: raw.path.clone(),
        remote: raw.remote.clone(),
        auth: raw.auth.clone(),
    }
}

fn category_label(category: Category) -> &'static str {
    match category {
        Category::Thing => "thing",
        Category::Action => "action",
        Category::Value => "value",
        Category::Enum => "enum",
        Category::Remote => "remote",
        Category::Auth => "auth",
        Category::Variety => "variety",
        Category::Interface => "interface",
    }
}
