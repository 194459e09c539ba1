use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::schema::types::definition::ScalarKind;
use crate::schema::types::{SchemaError, SchemaResult};

/// Represents a complete JSON schema definition.
///
/// This is the raw, name-referencing form a schema arrives in: every
/// cross-definition reference is a string name. The resolver turns it into
/// a fully linked graph with no string references remaining.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonSchemaDefinition {
    pub name: String,
    #[serde(default)]
    pub things: HashMap<String, JsonThing>,
    #[serde(default)]
    pub actions: HashMap<String, JsonAction>,
    #[serde(default)]
    pub values: HashMap<String, JsonValueDef>,
    #[serde(default)]
    pub enums: HashMap<String, JsonEnum>,
    #[serde(default)]
    pub remotes: HashMap<String, JsonRemote>,
    #[serde(default)]
    pub auths: HashMap<String, JsonAuth>,
    #[serde(default)]
    pub varieties: HashMap<String, JsonVariety>,
    #[serde(default)]
    pub interfaces: HashMap<String, JsonInterface>,
    /// Schema-level endpoint defaults, overlaid by per-definition overrides
    #[serde(default)]
    pub endpoint_defaults: Option<JsonEndpoint>,
}

impl JsonSchemaDefinition {
    /// Parses a raw schema from its JSON text form
    pub fn from_json_str(text: &str) -> SchemaResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| SchemaError::InvalidData(format!("Failed to parse schema: {}", e)))
    }
}

/// Raw form of a thing definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonThing {
    #[serde(default)]
    pub fields: HashMap<String, JsonField>,
    /// Names of interfaces this thing conforms to
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub endpoint: Option<JsonEndpoint>,
}

/// Raw form of an action definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonAction {
    #[serde(default)]
    pub fields: HashMap<String, JsonField>,
    /// Whether this action is a base action
    #[serde(default)]
    pub base: bool,
    /// Name of the remote this action overrides the base action for
    #[serde(default)]
    pub remote_base_of: Option<String>,
    #[serde(default)]
    pub endpoint: Option<JsonEndpoint>,
}

/// Raw form of a field declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonField {
    pub field_type: JsonFieldType,
    #[serde(default)]
    pub nullable: bool,
    /// Sibling field names this field locally derives from
    #[serde(default)]
    pub reactive_to: Vec<String>,
}

/// Raw form of a field type, referencing targets by name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JsonFieldType {
    Reference { target: String },
    List { inner: Box<JsonFieldType> },
    Map { inner: Box<JsonFieldType> },
    Interface { target: String },
    Variety { target: String },
}

/// Raw form of a value definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonValueDef {
    pub scalar: ScalarKind,
}

/// Raw form of an enum definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonEnum {
    #[serde(default)]
    pub cases: Vec<String>,
}

/// Raw form of a remote definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonRemote {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub default: bool,
}

/// Raw form of an auth definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonAuth {
    #[serde(default)]
    pub scheme: String,
    #[serde(default)]
    pub default: bool,
}

/// Raw form of a variety definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonVariety {
    /// Names of member things
    #[serde(default)]
    pub members: Vec<String>,
}

/// Raw form of an interface definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonInterface {
    /// Field names a conforming thing must declare
    #[serde(default)]
    pub required_fields: Vec<String>,
}

/// Raw form of an endpoint configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonEndpoint {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub remote: Option<String>,
    #[serde(default)]
    pub auth: Option<String>,
}
