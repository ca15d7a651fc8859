//! Descriptor classification.
//!
//! Decides whether a changed file is a descriptor anyone should care
//! about. Classification opens and parses the candidate, which is the
//! price of getting it right; a file that fails to parse is simply not a
//! descriptor.

use crate::document::Document;
use crate::error::DescriptorError;
use crate::wiring::BEANS_ELEMENT;
use std::path::Path;
use tracing::debug;

/// File extension shared by every descriptor family.
pub const DESCRIPTOR_EXTENSION: &str = "xml";

/// Token the doctype of a mapping descriptor must contain.
pub const MAPPER_DOCTYPE_MARKER: &str = "mapper";

/// Checks the extension only, without touching the file.
pub fn has_descriptor_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(DESCRIPTOR_EXTENSION))
        .unwrap_or(false)
}

/// True for `.xml` files whose doctype declares a mapper.
pub fn is_mapper_document(path: &Path) -> bool {
    read_candidate(path)
        .and_then(|doc| doc.doctype)
        .map(|doctype| doctype.contains(MAPPER_DOCTYPE_MARKER))
        .unwrap_or(false)
}

/// True for `.xml` files rooted at `<beans>`.
pub fn is_wiring_document(path: &Path) -> bool {
    read_candidate(path)
        .map(|doc| doc.root.name == BEANS_ELEMENT)
        .unwrap_or(false)
}

fn read_candidate(path: &Path) -> Option<Document> {
    if !has_descriptor_extension(path) {
        return None;
    }

    match Document::read(path) {
        Ok(doc) => Some(doc),
        Err(DescriptorError::Io { source, .. }) => {
            debug!("Cannot read {}: {}", path.display(), source);
            None
        }
        Err(e) => {
            debug!("Not a descriptor: {}", e);
            None
        }
    }
}
