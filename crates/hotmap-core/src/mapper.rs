//! Mapping descriptors.
//!
//! Turns a `<mapper namespace="...">` document into the entries it
//! declares, with every id already qualified. Nothing here touches the
//! registry; registration happens in one step so a descriptor either
//! lands completely or not at all.

use crate::document::{Document, Element, Node};
use crate::entry::{
    CacheDecl, CacheRef, KeyGenerator, MappedStatement, MappingEntry, ParameterMap, ResultMap,
    ResultMapping, SqlFragment, StatementKind,
};
use crate::error::{DescriptorError, Result};
use crate::location::location_of;
use crate::qualify::{apply_current_namespace, value_based_identifier};
use std::collections::HashSet;
use std::path::Path;

/// Root element of a mapping descriptor.
pub const MAPPER_ELEMENT: &str = "mapper";

/// Marker appended to a statement id to name its generated-key statement.
pub const SELECT_KEY_SUFFIX: &str = "!selectKey";

const RESULT_MAPPING_ELEMENTS: [&str; 8] = [
    "id",
    "result",
    "idArg",
    "arg",
    "association",
    "collection",
    "discriminator",
    "case",
];

/// Everything one mapping descriptor declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperDescriptor {
    pub namespace: String,
    pub resource: String,
    pub statements: Vec<MappedStatement>,
    pub key_generators: Vec<KeyGenerator>,
    pub fragments: Vec<SqlFragment>,
    pub result_maps: Vec<ResultMap>,
    pub parameter_maps: Vec<ParameterMap>,
    pub cache: Option<CacheDecl>,
    pub cache_ref: Option<CacheRef>,
}

/// Extracts the declared namespace from a mapper document.
pub fn namespace_of(doc: &Document, origin: &str) -> Result<String> {
    if doc.root.name != MAPPER_ELEMENT {
        return Err(DescriptorError::invalid(
            origin,
            format!("expected <{}> root, found <{}>", MAPPER_ELEMENT, doc.root.name),
        ));
    }

    doc.root
        .non_blank_attr("namespace")
        .map(str::to_string)
        .ok_or_else(|| DescriptorError::invalid(origin, "mapper's namespace cannot be empty"))
}

impl MapperDescriptor {
    /// Reads a descriptor from disk. The resource is the path itself.
    pub fn read(path: &Path) -> Result<Self> {
        let doc = Document::read(path)?;
        Self::from_document(&doc, &location_of(path))
    }

    /// Parses descriptor text recorded under `resource`.
    pub fn parse(text: &str, resource: &str) -> Result<Self> {
        let doc = Document::parse(text, resource)?;
        Self::from_document(&doc, resource)
    }

    pub fn from_document(doc: &Document, resource: &str) -> Result<Self> {
        let namespace = namespace_of(doc, resource)?;
        let builder = EntryBuilder {
            namespace: &namespace,
            resource,
            root: &doc.root,
        };

        let mut statements = Vec::new();
        let mut key_generators = Vec::new();
        for element in doc.root.elements_named(&StatementKind::ELEMENTS) {
            let (statement, key_generator) = builder.statement(element)?;
            statements.push(statement);
            key_generators.extend(key_generator);
        }

        let fragments = doc
            .root
            .elements_named(&["sql"])
            .map(|element| builder.fragment(element))
            .collect::<Result<Vec<_>>>()?;

        let result_maps = doc
            .root
            .elements_named(&["resultMap"])
            .map(|element| builder.result_map(element))
            .collect::<Result<Vec<_>>>()?;

        let parameter_maps = doc
            .root
            .elements_named(&["parameterMap"])
            .map(|element| builder.parameter_map(element))
            .collect::<Result<Vec<_>>>()?;

        let cache = doc
            .root
            .first_element("cache")
            .map(|element| builder.cache(element))
            .transpose()?;

        let cache_ref = doc
            .root
            .first_element("cache-ref")
            .map(|element| builder.cache_ref(element))
            .transpose()?;

        let descriptor = Self {
            namespace: namespace.clone(),
            resource: resource.to_string(),
            statements,
            key_generators,
            fragments,
            result_maps,
            parameter_maps,
            cache,
            cache_ref,
        };
        descriptor.check_unique_ids()?;
        Ok(descriptor)
    }

    /// Every entry, in registration order.
    pub fn entries(&self) -> Vec<MappingEntry> {
        let mut entries = Vec::with_capacity(self.entry_count());
        entries.extend(self.cache_ref.clone().map(MappingEntry::CacheRef));
        entries.extend(self.cache.clone().map(MappingEntry::Cache));
        entries.extend(self.parameter_maps.iter().cloned().map(MappingEntry::ParameterMap));
        entries.extend(self.result_maps.iter().cloned().map(MappingEntry::ResultMap));
        entries.extend(self.fragments.iter().cloned().map(MappingEntry::SqlFragment));
        entries.extend(self.key_generators.iter().cloned().map(MappingEntry::KeyGenerator));
        entries.extend(self.statements.iter().cloned().map(MappingEntry::Statement));
        entries
    }

    pub fn entry_count(&self) -> usize {
        self.statements.len()
            + self.key_generators.len()
            + self.fragments.len()
            + self.result_maps.len()
            + self.parameter_maps.len()
            + usize::from(self.cache.is_some())
            + usize::from(self.cache_ref.is_some())
    }

    fn check_unique_ids(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in self.entries() {
            if !seen.insert((entry.kind(), entry.key().to_string())) {
                return Err(DescriptorError::invalid(
                    &self.resource,
                    format!("{} '{}' is declared twice", entry.kind(), entry.key()),
                ));
            }
        }
        Ok(())
    }
}

struct EntryBuilder<'a> {
    namespace: &'a str,
    resource: &'a str,
    root: &'a Element,
}

impl EntryBuilder<'_> {
    fn qualify(&self, base: &str, is_reference: bool) -> Result<String> {
        apply_current_namespace(base, is_reference, self.namespace).map_err(|source| {
            DescriptorError::Qualify {
                origin: self.resource.to_string(),
                source,
            }
        })
    }

    fn required_id<'e>(&self, element: &'e Element) -> Result<&'e str> {
        element.non_blank_attr("id").ok_or_else(|| {
            DescriptorError::invalid(
                self.resource,
                format!("<{}> in namespace '{}' has no id", element.name, self.namespace),
            )
        })
    }

    fn statement(&self, element: &Element) -> Result<(MappedStatement, Option<KeyGenerator>)> {
        let local_id = self.required_id(element)?;
        let id = self.qualify(local_id, false)?;
        let kind = StatementKind::from_element(&element.name).ok_or_else(|| {
            DescriptorError::invalid(self.resource, format!("<{}> is not a statement", element.name))
        })?;

        let result_maps = element
            .non_blank_attr("resultMap")
            .map(|refs| {
                refs.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(|r| self.qualify(r, true))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        let mut refids = Vec::new();
        collect_includes(element, &mut refids);
        let includes = refids
            .into_iter()
            .map(|refid| self.qualify(refid, true))
            .collect::<Result<Vec<_>>>()?;

        let key_generator = element
            .first_element("selectKey")
            .map(|select_key| -> Result<KeyGenerator> {
                Ok(KeyGenerator {
                    id: self.qualify(&format!("{local_id}{SELECT_KEY_SUFFIX}"), false)?,
                    statement_id: id.clone(),
                    namespace: self.namespace.to_string(),
                    key_property: select_key.non_blank_attr("keyProperty").map(str::to_string),
                    order: select_key.non_blank_attr("order").map(str::to_uppercase),
                    sql: select_key.text(),
                    resource: self.resource.to_string(),
                })
            })
            .transpose()?;

        let statement = MappedStatement {
            id,
            local_id: local_id.to_string(),
            namespace: self.namespace.to_string(),
            kind,
            parameter_type: element.non_blank_attr("parameterType").map(str::to_string),
            result_type: element.non_blank_attr("resultType").map(str::to_string),
            result_maps,
            sql: statement_text(element),
            includes,
            key_generator: key_generator.as_ref().map(|k| k.id.clone()),
            resource: self.resource.to_string(),
        };

        Ok((statement, key_generator))
    }

    fn fragment(&self, element: &Element) -> Result<SqlFragment> {
        let local_id = self.required_id(element)?;
        Ok(SqlFragment {
            id: self.qualify(local_id, false)?,
            local_id: local_id.to_string(),
            namespace: self.namespace.to_string(),
            sql: element.text(),
            resource: self.resource.to_string(),
        })
    }

    fn result_map(&self, element: &Element) -> Result<ResultMap> {
        let local_id = match element.non_blank_attr("id") {
            Some(id) => id.to_string(),
            None => value_based_identifier(&[self.root], element),
        };

        let mut mappings = Vec::new();
        collect_result_mappings(element, &mut mappings);

        Ok(ResultMap {
            id: self.qualify(&local_id, false)?,
            local_id,
            namespace: self.namespace.to_string(),
            type_name: element.non_blank_attr("type").map(str::to_string),
            extends: element
                .non_blank_attr("extends")
                .map(|base| self.qualify(base, true))
                .transpose()?,
            mappings,
            resource: self.resource.to_string(),
        })
    }

    fn parameter_map(&self, element: &Element) -> Result<ParameterMap> {
        let local_id = self.required_id(element)?;
        Ok(ParameterMap {
            id: self.qualify(local_id, false)?,
            local_id: local_id.to_string(),
            namespace: self.namespace.to_string(),
            type_name: element.non_blank_attr("type").map(str::to_string),
            parameters: element
                .elements_named(&["parameter"])
                .filter_map(|p| p.non_blank_attr("property"))
                .map(str::to_string)
                .collect(),
            resource: self.resource.to_string(),
        })
    }

    fn cache(&self, element: &Element) -> Result<CacheDecl> {
        Ok(CacheDecl {
            namespace: self.namespace.to_string(),
            eviction: element
                .non_blank_attr("eviction")
                .unwrap_or("LRU")
                .to_uppercase(),
            size: self.number_attr(element, "size")?,
            flush_interval_ms: self.number_attr(element, "flushInterval")?,
            read_only: element
                .non_blank_attr("readOnly")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            resource: self.resource.to_string(),
        })
    }

    fn cache_ref(&self, element: &Element) -> Result<CacheRef> {
        let target = element.non_blank_attr("namespace").ok_or_else(|| {
            DescriptorError::invalid(self.resource, "cache-ref element requires a namespace attribute")
        })?;
        Ok(CacheRef {
            namespace: self.namespace.to_string(),
            target: target.to_string(),
            resource: self.resource.to_string(),
        })
    }

    fn number_attr<T: std::str::FromStr>(&self, element: &Element, name: &str) -> Result<Option<T>> {
        element
            .non_blank_attr(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|_| {
                    DescriptorError::invalid(
                        self.resource,
                        format!("<{}> attribute '{}' is not a number: {}", element.name, name, raw),
                    )
                })
            })
            .transpose()
    }
}

/// Statement body without the `<selectKey>` text.
fn statement_text(element: &Element) -> String {
    let mut parts = Vec::new();
    for child in &element.children {
        match child {
            Node::Text(text) => parts.push(text.clone()),
            Node::Element(nested) if nested.name != "selectKey" => parts.push(nested.text()),
            Node::Element(_) => {}
        }
    }
    parts
        .iter()
        .flat_map(|part| part.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_includes<'a>(element: &'a Element, refids: &mut Vec<&'a str>) {
    for nested in element.elements() {
        if nested.name == "include" {
            if let Some(refid) = nested.non_blank_attr("refid") {
                refids.push(refid);
            }
        } else {
            collect_includes(nested, refids);
        }
    }
}

fn collect_result_mappings(element: &Element, mappings: &mut Vec<ResultMapping>) {
    for nested in element.elements() {
        if nested.name == "constructor" {
            collect_result_mappings(nested, mappings);
            continue;
        }
        if !RESULT_MAPPING_ELEMENTS.contains(&nested.name.as_str()) {
            continue;
        }
        mappings.push(ResultMapping {
            element: nested.name.clone(),
            property: nested
                .non_blank_attr("property")
                .or_else(|| nested.non_blank_attr("name"))
                .map(str::to_string),
            column: nested.non_blank_attr("column").map(str::to_string),
        });
        collect_result_mappings(nested, mappings);
    }
}
