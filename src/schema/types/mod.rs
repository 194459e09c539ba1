pub mod definition;
pub mod errors;
pub mod field;
pub mod json_schema;

pub use definition::{
    Action, Auth, DefId, Definition, EndpointConfig, EnumDef, Remote, ScalarKind, Thing,
    ThingInterface, ValueDef, Variety,
};
pub use errors::{SchemaError, SchemaResult};
pub use field::{Field, FieldType};
pub use json_schema::{
    JsonAction, JsonAuth, JsonEndpoint, JsonEnum, JsonField, JsonFieldType, JsonInterface,
    JsonRemote, JsonSchemaDefinition, JsonThing, JsonValueDef, JsonVariety,
};
