//! Bean-wiring descriptors.
//!
//! A `<beans>` document lists object definitions and how their
//! properties are wired. Reloading one replaces exactly the definitions
//! that came from it.

use crate::document::{Document, Element};
use crate::error::{DescriptorError, Result};
use crate::location::location_of;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// Root element of a wiring descriptor.
pub const BEANS_ELEMENT: &str = "beans";

const DEFAULT_SCOPE: &str = "singleton";

/// How a property gets its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    /// A literal.
    Value(String),
    /// Another bean, by id.
    Ref(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyBinding {
    pub name: String,
    pub value: PropertyValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BeanDefinition {
    pub id: String,
    pub class_name: String,
    pub scope: String,
    pub lazy_init: bool,
    pub properties: Vec<PropertyBinding>,
    pub resource: String,
}

/// All bean definitions in one wiring descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeansDescriptor {
    pub resource: String,
    pub beans: Vec<BeanDefinition>,
}

impl BeansDescriptor {
    pub fn read(path: &Path) -> Result<Self> {
        let doc = Document::read(path)?;
        Self::from_document(&doc, &location_of(path))
    }

    pub fn parse(text: &str, resource: &str) -> Result<Self> {
        let doc = Document::parse(text, resource)?;
        Self::from_document(&doc, resource)
    }

    pub fn from_document(doc: &Document, resource: &str) -> Result<Self> {
        if doc.root.name != BEANS_ELEMENT {
            return Err(DescriptorError::invalid(
                resource,
                format!("expected <{}> root, found <{}>", BEANS_ELEMENT, doc.root.name),
            ));
        }

        let mut seen = HashSet::new();
        let mut beans = Vec::new();
        for element in doc.root.elements_named(&["bean"]) {
            let bean = bean_definition(element, resource)?;
            if !seen.insert(bean.id.clone()) {
                return Err(DescriptorError::invalid(
                    resource,
                    format!("bean '{}' is declared twice", bean.id),
                ));
            }
            beans.push(bean);
        }

        Ok(Self {
            resource: resource.to_string(),
            beans,
        })
    }
}

fn bean_definition(element: &Element, resource: &str) -> Result<BeanDefinition> {
    let id = element
        .non_blank_attr("id")
        .or_else(|| element.non_blank_attr("name"))
        .ok_or_else(|| DescriptorError::invalid(resource, "bean without id or name"))?;
    let class_name = element.non_blank_attr("class").ok_or_else(|| {
        DescriptorError::invalid(resource, format!("bean '{}' has no class", id))
    })?;

    let properties = element
        .elements_named(&["property"])
        .map(|property| property_binding(property, id, resource))
        .collect::<Result<Vec<_>>>()?;

    Ok(BeanDefinition {
        id: id.to_string(),
        class_name: class_name.to_string(),
        scope: element
            .non_blank_attr("scope")
            .unwrap_or(DEFAULT_SCOPE)
            .to_string(),
        lazy_init: element
            .non_blank_attr("lazy-init")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false),
        properties,
        resource: resource.to_string(),
    })
}

fn property_binding(element: &Element, bean: &str, resource: &str) -> Result<PropertyBinding> {
    let name = element.non_blank_attr("name").ok_or_else(|| {
        DescriptorError::invalid(resource, format!("property without name on bean '{}'", bean))
    })?;

    let value = match (element.attr("value"), element.non_blank_attr("ref")) {
        (Some(value), None) => PropertyValue::Value(value.to_string()),
        (None, Some(target)) => PropertyValue::Ref(target.to_string()),
        _ => {
            // <property name="x"><value>..</value></property>
            match element.first_element("value") {
                Some(nested) => PropertyValue::Value(nested.text()),
                None => {
                    return Err(DescriptorError::invalid(
                        resource,
                        format!(
                            "property '{}' on bean '{}' needs exactly one of value or ref",
                            name, bean
                        ),
                    ))
                }
            }
        }
    };

    Ok(PropertyBinding {
        name: name.to_string(),
        value,
    })
}
