//! Mapping entry representation.
//!
//! A mapping descriptor declares a handful of entry families. Each
//! entry knows its qualified id, the namespace it was declared under and
//! the resource it was loaded from, which is all the reconciler needs to
//! find and replace it later.

use serde::Serialize;
use std::fmt;

/// The statement flavours a mapper can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    /// Element names of statement-like declarations.
    pub const ELEMENTS: [&'static str; 4] = ["select", "insert", "update", "delete"];

    pub fn from_element(name: &str) -> Option<Self> {
        match name {
            "select" => Some(Self::Select),
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

/// Which registry table an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Statement,
    KeyGenerator,
    SqlFragment,
    ResultMap,
    ParameterMap,
    Cache,
    CacheRef,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Statement => "statement",
            Self::KeyGenerator => "key_generator",
            Self::SqlFragment => "sql_fragment",
            Self::ResultMap => "result_map",
            Self::ParameterMap => "parameter_map",
            Self::Cache => "cache",
            Self::CacheRef => "cache_ref",
        };
        write!(f, "{}", s)
    }
}

/// A select/insert/update/delete declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedStatement {
    /// Qualified id (`namespace.localId`).
    pub id: String,
    pub local_id: String,
    pub namespace: String,
    pub kind: StatementKind,
    pub parameter_type: Option<String>,
    pub result_type: Option<String>,
    /// Qualified result map references.
    pub result_maps: Vec<String>,
    /// Statement body with whitespace collapsed.
    pub sql: String,
    /// Qualified ids of `<include refid>` targets.
    pub includes: Vec<String>,
    /// Id of the generated-key statement, if one was declared.
    pub key_generator: Option<String>,
    pub resource: String,
}

/// A `<selectKey>` attached to a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyGenerator {
    /// `<statement id>!selectKey`.
    pub id: String,
    pub statement_id: String,
    pub namespace: String,
    pub key_property: Option<String>,
    pub order: Option<String>,
    pub sql: String,
    pub resource: String,
}

/// A reusable `<sql>` fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlFragment {
    pub id: String,
    pub local_id: String,
    pub namespace: String,
    pub sql: String,
    pub resource: String,
}

/// One column/property pairing inside a result map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultMapping {
    pub element: String,
    pub property: Option<String>,
    pub column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultMap {
    pub id: String,
    /// The declared id, or a value-based identifier when none was given.
    pub local_id: String,
    pub namespace: String,
    pub type_name: Option<String>,
    pub extends: Option<String>,
    pub mappings: Vec<ResultMapping>,
    pub resource: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterMap {
    pub id: String,
    pub local_id: String,
    pub namespace: String,
    pub type_name: Option<String>,
    pub parameters: Vec<String>,
    pub resource: String,
}

/// A `<cache>` declaration, keyed by namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheDecl {
    pub namespace: String,
    pub eviction: String,
    pub size: Option<u32>,
    pub flush_interval_ms: Option<u64>,
    pub read_only: bool,
    pub resource: String,
}

/// A `<cache-ref>` binding one namespace to another namespace's cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheRef {
    pub namespace: String,
    pub target: String,
    pub resource: String,
}

/// Any entry a mapping descriptor can put into the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingEntry {
    Statement(MappedStatement),
    KeyGenerator(KeyGenerator),
    SqlFragment(SqlFragment),
    ResultMap(ResultMap),
    ParameterMap(ParameterMap),
    Cache(CacheDecl),
    CacheRef(CacheRef),
}

impl MappingEntry {
    /// Key of the entry in its table. Caches and cache refs are keyed by
    /// namespace, everything else by qualified id.
    pub fn key(&self) -> &str {
        match self {
            Self::Statement(e) => &e.id,
            Self::KeyGenerator(e) => &e.id,
            Self::SqlFragment(e) => &e.id,
            Self::ResultMap(e) => &e.id,
            Self::ParameterMap(e) => &e.id,
            Self::Cache(e) => &e.namespace,
            Self::CacheRef(e) => &e.namespace,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Statement(_) => EntryKind::Statement,
            Self::KeyGenerator(_) => EntryKind::KeyGenerator,
            Self::SqlFragment(_) => EntryKind::SqlFragment,
            Self::ResultMap(_) => EntryKind::ResultMap,
            Self::ParameterMap(_) => EntryKind::ParameterMap,
            Self::Cache(_) => EntryKind::Cache,
            Self::CacheRef(_) => EntryKind::CacheRef,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Self::Statement(e) => &e.namespace,
            Self::KeyGenerator(e) => &e.namespace,
            Self::SqlFragment(e) => &e.namespace,
            Self::ResultMap(e) => &e.namespace,
            Self::ParameterMap(e) => &e.namespace,
            Self::Cache(e) => &e.namespace,
            Self::CacheRef(e) => &e.namespace,
        }
    }

    pub fn resource(&self) -> &str {
        match self {
            Self::Statement(e) => &e.resource,
            Self::KeyGenerator(e) => &e.resource,
            Self::SqlFragment(e) => &e.resource,
            Self::ResultMap(e) => &e.resource,
            Self::ParameterMap(e) => &e.resource,
            Self::Cache(e) => &e.resource,
            Self::CacheRef(e) => &e.resource,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_kind_from_element() {
        for name in StatementKind::ELEMENTS {
            let kind = StatementKind::from_element(name).unwrap();
            assert_eq!(kind.to_string(), name);
        }
        assert_eq!(StatementKind::from_element("sql"), None);
    }

    #[test]
    fn test_cache_ref_is_keyed_by_namespace() {
        let entry = MappingEntry::CacheRef(CacheRef {
            namespace: "app.OrderMapper".to_string(),
            target: "app.UserMapper".to_string(),
            resource: "/m/OrderMapper.xml".to_string(),
        });
        assert_eq!(entry.key(), "app.OrderMapper");
        assert_eq!(entry.kind(), EntryKind::CacheRef);
    }

    #[test]
    fn test_entry_serializes_with_kind_tag() {
        let entry = MappingEntry::SqlFragment(SqlFragment {
            id: "ns.cols".to_string(),
            local_id: "cols".to_string(),
            namespace: "ns".to_string(),
            sql: "id, name".to_string(),
            resource: "/m/A.xml".to_string(),
        });
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "sql_fragment");
        assert_eq!(json["id"], "ns.cols");
    }
}
