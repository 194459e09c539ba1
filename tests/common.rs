#![allow(dead_code)]

use std::sync::Arc;

use tether::schema::SchemaGraph;
use tether::{
    resolve, JsonSchemaDefinition, LocalCache, ReactiveRegistry, RemoteBoundary, RuntimeConfig,
    SchemaCore, SyncRuntime,
};

/// Initializes test logging; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A bookmark-manager schema exercising the full type system: values,
/// enums, an interface with two conformers, a variety closing a reference
/// cycle (folders contain nodes, nodes include folders), reactive fields,
/// scoped base actions, and endpoint configuration.
pub fn bookmark_schema() -> serde_json::Value {
    serde_json::json!({
        "name": "bookmarks",
        "values": {
            "Text": {"scalar": "string"},
            "Flag": {"scalar": "bool"}
        },
        "enums": {
            "Visibility": {"cases": ["private", "public"]}
        },
        "interfaces": {
            "Linked": {"required_fields": ["url"]}
        },
        "varieties": {
            "Node": {"members": ["Bookmark", "Folder"]}
        },
        "things": {
            "Bookmark": {
                "fields": {
                    "url": {"field_type": {"kind": "reference", "target": "Text"}},
                    "title": {"field_type": {"kind": "reference", "target": "Text"}, "nullable": true},
                    "saved": {"field_type": {"kind": "reference", "target": "Flag"}},
                    "visibility": {"field_type": {"kind": "reference", "target": "Visibility"}},
                    "tags": {
                        "field_type": {"kind": "list", "inner": {"kind": "reference", "target": "Tag"}}
                    },
                    "display": {
                        "field_type": {"kind": "reference", "target": "Text"},
                        "reactive_to": ["title", "url"]
                    }
                },
                "interfaces": ["Linked"],
                "endpoint": {"path": "/bookmarks"}
            },
            "Feed": {
                "fields": {
                    "url": {"field_type": {"kind": "reference", "target": "Text"}}
                },
                "interfaces": ["Linked"]
            },
            "Folder": {
                "fields": {
                    "name": {"field_type": {"kind": "reference", "target": "Text"}},
                    "children": {
                        "field_type": {"kind": "list", "inner": {"kind": "variety", "target": "Node"}}
                    }
                }
            },
            "Tag": {
                "fields": {
                    "label": {"field_type": {"kind": "reference", "target": "Text"}}
                }
            }
        },
        "actions": {
            "fetch": {"base": true},
            "add_bookmark": {
                "fields": {
                    "url": {"field_type": {"kind": "reference", "target": "Text"}},
                    "title": {"field_type": {"kind": "reference", "target": "Text"}, "nullable": true}
                },
                "endpoint": {"path": "/bookmarks/add"}
            },
            "zeta_push": {"remote_base_of": "backup"},
            "alpha_push": {"remote_base_of": "primary"}
        },
        "remotes": {
            "primary": {"url": "https://api.example.com", "default": true},
            "backup": {"url": "https://backup.example.com"}
        },
        "auths": {
            "api_key": {"scheme": "bearer", "default": true}
        }
    })
}

pub fn raw_schema(json: serde_json::Value) -> JsonSchemaDefinition {
    serde_json::from_value(json).unwrap()
}

pub fn resolved() -> Arc<SchemaGraph> {
    init_logging();
    Arc::new(resolve(&raw_schema(bookmark_schema())).unwrap())
}

pub fn runtime_with(
    cache: Arc<dyn LocalCache>,
    remote: Arc<dyn RemoteBoundary>,
    registry: Arc<ReactiveRegistry>,
) -> SyncRuntime {
    let core = SchemaCore::new(resolved());
    SyncRuntime::new(core, cache, remote, registry, &RuntimeConfig::default())
}
