use crate::schema::types::definition::DefId;

/// The closed algebra of field shapes.
///
/// Reference points at a single stateful definition; List and Map are
/// homogeneous collections over a collection-eligible inner type; Interface
/// and Variety are the open types, holding any thing from a conforming or
/// declared member set. The concrete set behind an open type is answered by
/// [`SchemaGraph::compatible`](crate::schema::SchemaGraph::compatible) and
/// is only defined once resolution has completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Single stateful definition (thing, value, or enum)
    Reference(DefId),
    /// Homogeneous list of the inner type
    List(Box<FieldType>),
    /// Homogeneous string-keyed map of the inner type
    Map(Box<FieldType>),
    /// Any thing conforming to the named contract
    Interface(DefId),
    /// Any thing from the variety's declared member set
    Variety(DefId),
}

impl FieldType {
    /// Whether this type may appear inside a collection.
    ///
    /// Collections nest neither lists nor maps.
    #[must_use]
    pub fn collection_eligible(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Map(_))
    }

    /// Whether this is an open type (interface or variety)
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Interface(_) | Self::Variety(_))
    }
}

/// A field owned by a thing or an action.
#[derive(Debug, Clone)]
pub struct Field {
    /// Shape of the values this field holds
    pub field_type: FieldType,
    /// Whether the field admits absence
    pub nullable: bool,
    /// Sibling fields this field locally derives from.
    ///
    /// Non-empty means the field is reactive: the evaluator recomputes it
    /// whenever a dependency changes in the cache, with no remote round
    /// trip. The resolver rejects cyclic dependency declarations.
    pub reactive_to: Vec<String>,
}

impl Field {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            nullable: false,
            reactive_to: Vec::new(),
        }
    }

    /// Whether this field is locally derived from other fields
    #[must_use]
    pub fn is_reactive(&self) -> bool {
        !self.reactive_to.is_empty()
    }
}
