//! Qualified id rules.
//!
//! Every entry in the registry is addressed as `namespace.localId`.
//! Namespaces themselves may contain dots, local ids may not.

use crate::document::Element;
use crate::error::QualifyError;

/// Separator between a namespace and a local id.
pub const SEPARATOR: char = '.';

/// Qualifies `base` with `namespace`.
///
/// References that already carry a qualifier point at another namespace
/// and are returned as-is. Local declarations may already be qualified
/// with their own namespace, but any other dot is a configuration error.
pub fn apply_current_namespace(
    base: &str,
    is_reference: bool,
    namespace: &str,
) -> Result<String, QualifyError> {
    if base.is_empty() {
        return Err(QualifyError::EmptyId(namespace.to_string()));
    }

    if is_reference {
        if base.contains(SEPARATOR) {
            return Ok(base.to_string());
        }
    } else {
        if in_namespace(base, namespace) {
            return Ok(base.to_string());
        }
        if base.contains(SEPARATOR) {
            return Err(QualifyError::DottedLocalId {
                id: base.to_string(),
                namespace: namespace.to_string(),
            });
        }
    }

    Ok(format!("{namespace}{SEPARATOR}{base}"))
}

/// True if `qualified_id` has `namespace` as its dot-delimited prefix.
pub fn in_namespace(qualified_id: &str, namespace: &str) -> bool {
    qualified_id.len() > namespace.len() + 1
        && qualified_id.starts_with(namespace)
        && qualified_id[namespace.len()..].starts_with(SEPARATOR)
}

/// Builds a stable identifier for elements that were declared without an id.
///
/// `ancestors` runs from the document root down to (not including)
/// `element`. Each step contributes its name, plus `[value]` taken from
/// the first of `id`, `value` or `property`.
pub fn value_based_identifier(ancestors: &[&Element], element: &Element) -> String {
    ancestors
        .iter()
        .copied()
        .chain(std::iter::once(element))
        .map(|step| {
            let value = step
                .attr("id")
                .or_else(|| step.attr("value"))
                .or_else(|| step.attr("property"));
            match value {
                Some(value) => format!("{}[{}]", step.name, value.replace(SEPARATOR, "_")),
                None => step.name.clone(),
            }
        })
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn test_local_id_gets_namespace() {
        assert_eq!(apply_current_namespace("foo", false, "ns").unwrap(), "ns.foo");
    }

    #[test]
    fn test_already_qualified_local_id_is_unchanged() {
        assert_eq!(apply_current_namespace("ns.foo", false, "ns").unwrap(), "ns.foo");
    }

    #[test]
    fn test_foreign_qualifier_on_local_id_fails() {
        let err = apply_current_namespace("other.foo", false, "ns").unwrap_err();
        assert_eq!(
            err,
            QualifyError::DottedLocalId {
                id: "other.foo".to_string(),
                namespace: "ns".to_string(),
            }
        );
    }

    #[test]
    fn test_reference_to_other_namespace_is_kept() {
        assert_eq!(
            apply_current_namespace("other.foo", true, "ns").unwrap(),
            "other.foo"
        );
        assert_eq!(apply_current_namespace("foo", true, "ns").unwrap(), "ns.foo");
    }

    #[test]
    fn test_dotted_namespace() {
        let ns = "com.acme.UserMapper";
        assert_eq!(
            apply_current_namespace("findById", false, ns).unwrap(),
            "com.acme.UserMapper.findById"
        );
        assert_eq!(
            apply_current_namespace("com.acme.UserMapper.findById", false, ns).unwrap(),
            "com.acme.UserMapper.findById"
        );
    }

    #[test]
    fn test_empty_id_fails() {
        assert!(apply_current_namespace("", false, "ns").is_err());
    }

    #[test]
    fn test_in_namespace_needs_separator() {
        assert!(in_namespace("user.find", "user"));
        assert!(!in_namespace("users.find", "user"));
        assert!(!in_namespace("user", "user"));
        assert!(!in_namespace("user.", "user"));
        assert!(in_namespace("a.b.c", "a.b"));
    }

    #[test]
    fn test_value_based_identifier() {
        let doc = Document::parse(
            r#"<mapper namespace="ns"><resultMap type="User"><collection property="posts.items"/></resultMap></mapper>"#,
            "inline",
        )
        .unwrap();
        let result_map = doc.root.first_element("resultMap").unwrap();
        let collection = result_map.first_element("collection").unwrap();

        assert_eq!(value_based_identifier(&[&doc.root], result_map), "mapper_resultMap");
        assert_eq!(
            value_based_identifier(&[&doc.root, result_map], collection),
            "mapper_resultMap_collection[posts_items]"
        );
    }
}
