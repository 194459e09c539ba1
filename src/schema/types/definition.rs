use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::types::field::Field;

/// Stable identity of a definition inside a resolved graph.
///
/// Identities are allocated by the resolver before any linking happens, so
/// definitions can reference each other cyclically without forward
/// declarations. A `DefId` is only meaningful for the graph that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DefId(pub(crate) usize);

impl DefId {
    /// Index of this definition in the graph's arena
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A named schema element after resolution.
///
/// Definitions are immutable once the resolver publishes the graph. All
/// cross-definition references are `DefId`s into the same graph; no string
/// references remain after resolution.
#[derive(Debug, Clone)]
pub enum Definition {
    /// Syncable data entity
    Thing(Thing),
    /// Operation/mutation definition
    Action(Action),
    /// Leaf scalar-like definition
    Value(ValueDef),
    /// Closed named value set
    Enum(EnumDef),
    /// Named backend target
    Remote(Remote),
    /// Credential configuration
    Auth(Auth),
    /// Explicit open union of compatible things
    Variety(Variety),
    /// Structural contract things may conform to
    Interface(ThingInterface),
}

impl Definition {
    /// Name of the definition, unique within its schema
    pub fn name(&self) -> &str {
        match self {
            Self::Thing(d) => &d.name,
            Self::Action(d) => &d.name,
            Self::Value(d) => &d.name,
            Self::Enum(d) => &d.name,
            Self::Remote(d) => &d.name,
            Self::Auth(d) => &d.name,
            Self::Variety(d) => &d.name,
            Self::Interface(d) => &d.name,
        }
    }

    /// Kind label used in lookups and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Thing(_) => "thing",
            Self::Action(_) => "action",
            Self::Value(_) => "value",
            Self::Enum(_) => "enum",
            Self::Remote(_) => "remote",
            Self::Auth(_) => "auth",
            Self::Variety(_) => "variety",
            Self::Interface(_) => "interface",
        }
    }

    /// Whether this definition represents runtime state.
    ///
    /// Stateful definitions (things, values, enums) are the only legal
    /// targets of a reference field type.
    pub fn is_stateful(&self) -> bool {
        matches!(self, Self::Thing(_) | Self::Value(_) | Self::Enum(_))
    }

    /// Whether this definition participates in synchronization
    pub fn is_syncable(&self) -> bool {
        matches!(self, Self::Thing(_) | Self::Action(_))
    }

    /// Merged endpoint configuration, if this definition is a syncable
    pub fn endpoint(&self) -> Option<&EndpointConfig> {
        match self {
            Self::Thing(d) => d.endpoint.as_ref(),
            Self::Action(d) => d.endpoint.as_ref(),
            _ => None,
        }
    }
}

/// A syncable data entity defined by the schema.
#[derive(Debug, Clone)]
pub struct Thing {
    /// Unique name identifying this thing
    pub name: String,
    /// Field definitions, keyed by field name
    pub fields: BTreeMap<String, Field>,
    /// Interfaces this thing conforms to, sorted by interface name
    pub interfaces: Vec<DefId>,
    /// Variety this thing is a member of, if any
    pub variety: Option<DefId>,
    /// Merged endpoint configuration (schema defaults overlaid by overrides)
    pub endpoint: Option<EndpointConfig>,
    /// Reactive fields in dependency-topological order.
    ///
    /// Computed by the resolver; a field appears here only after all of its
    /// `reactive_to` dependencies.
    pub reactive_order: Vec<String>,
}

impl Thing {
    /// A thing is reactive iff at least one field declares dependencies
    #[must_use]
    pub fn is_reactive(&self) -> bool {
        !self.reactive_order.is_empty()
    }
}

/// An operation definition.
///
/// At most one unscoped base action exists per schema, and each remote may
/// declare at most one overriding base action.
#[derive(Debug, Clone)]
pub struct Action {
    /// Unique name identifying this action
    pub name: String,
    /// Payload field definitions, keyed by field name
    pub fields: BTreeMap<String, Field>,
    /// Whether this action is a base action
    pub base: bool,
    /// Remote this action is the base of, if scoped
    pub remote: Option<DefId>,
    /// Merged endpoint configuration
    pub endpoint: Option<EndpointConfig>,
}

/// Scalar kind carried by a value definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    String,
    Int,
    Float,
    Bool,
    Bytes,
    Timestamp,
}

/// A leaf scalar-like definition
#[derive(Debug, Clone)]
pub struct ValueDef {
    pub name: String,
    pub scalar: ScalarKind,
}

/// A closed named value set
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    /// Declared cases, in declaration order
    pub cases: Vec<String>,
}

/// A named backend target
#[derive(Debug, Clone)]
pub struct Remote {
    pub name: String,
    /// Base URL of the backend
    pub url: String,
    /// Whether this remote is the schema default
    pub default: bool,
}

/// A credential configuration
#[derive(Debug, Clone)]
pub struct Auth {
    pub name: String,
    /// Credential scheme identifier (interpretation is external)
    pub scheme: String,
    /// Whether this auth is the schema default
    pub default: bool,
}

/// An explicit open union of compatible things
#[derive(Debug, Clone)]
pub struct Variety {
    pub name: String,
    /// Member things, sorted by thing name
    pub members: Vec<DefId>,
}

/// A structural contract things may conform to
#[derive(Debug, Clone)]
pub struct ThingInterface {
    pub name: String,
    /// Field names a conforming thing must declare
    pub required_fields: Vec<String>,
    /// Things conforming to this interface, sorted by thing name.
    ///
    /// Populated by the resolver; empty until resolution completes.
    pub conformers: Vec<DefId>,
}

/// Remote-routing configuration for a syncable.
///
/// Schema-level defaults are overlaid by per-definition overrides at
/// resolution time; a syncable with a non-null merged configuration is an
/// endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Request path relative to the remote's base URL
    pub path: Option<String>,
    /// Name of the remote to route to; falls back to the default remote
    pub remote: Option<String>,
    /// Name of the auth configuration to attach; falls back to the default
    pub auth: Option<String>,
}

impl EndpointConfig {
    /// Overlay `over` onto `base`, field by field.
    ///
    /// Returns `None` when neither side is present, keeping "not an
    /// endpoint" distinguishable from an empty configuration.
    pub fn merged(base: Option<&Self>, over: Option<&Self>) -> Option<Self> {
        match (base, over) {
            (None, None) => None,
            (Some(b), None) => Some(b.clone()),
            (None, Some(o)) => Some(o.clone()),
            (Some(b), Some(o)) => Some(Self {
                path: o.path.clone().or_else(|| b.path.clone()),
                remote: o.remote.clone().or_else(|| b.remote.clone()),
                auth: o.auth.clone().or_else(|| b.auth.clone()),
            }),
        }
    }
}
