//! Prefix-based path filtering.
//!
//! The whole filtering language is two lists of string prefixes. Exclude
//! prefixes drop a path; include prefixes bring it back when either the
//! include is a prefix of the path or the path is a prefix of the include.
//! The second branch keeps the directories that lead down to a deeper
//! include rule.

use std::path::Path;

/// Separator of prefix lists in configuration values.
pub const LIST_SEPARATOR: char = ';';

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathFilter {
    includes: Vec<String>,
    excludes: Vec<String>,
}

impl PathFilter {
    pub fn new<I, E>(includes: I, excludes: E) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            includes: clean(includes),
            excludes: clean(excludes),
        }
    }

    /// A filter that keeps everything.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    pub fn keep(&self, path: &Path) -> bool {
        let current = path.to_string_lossy();

        let mut keep = !self
            .excludes
            .iter()
            .any(|prefix| current.starts_with(prefix.as_str()));

        let included = self.includes.iter().any(|prefix| {
            if prefix.len() > current.len() {
                prefix.starts_with(current.as_ref())
            } else {
                current.starts_with(prefix.as_str())
            }
        });
        if included {
            keep = true;
        }

        keep
    }
}

/// Splits a `;`-delimited prefix list, dropping blank items.
pub fn parse_prefix_list(value: &str) -> Vec<String> {
    value
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn clean<I>(prefixes: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    prefixes
        .into_iter()
        .map(Into::into)
        .map(|prefix| prefix.trim().to_string())
        .filter(|prefix| !prefix.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_overrides_exclude() {
        let filter = PathFilter::new(["/a/b/c"], ["/a/b"]);

        assert!(filter.keep(Path::new("/a/b/c/d.xml")));
        assert!(!filter.keep(Path::new("/a/b/x.xml")));
    }

    #[test]
    fn test_directories_leading_to_include_are_kept() {
        let filter = PathFilter::new(["/a/b/c"], ["/a"]);

        assert!(filter.keep(Path::new("/a/b")));
        assert!(filter.keep(Path::new("/a")));
        assert!(!filter.keep(Path::new("/a/z")));
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let filter = PathFilter::allow_all();
        assert!(filter.keep(Path::new("/anything/at/all.xml")));
    }

    #[test]
    fn test_unmatched_include_does_not_drop() {
        let filter = PathFilter::new(["/src/main"], Vec::<String>::new());
        assert!(filter.keep(Path::new("/other/file.xml")));
    }

    #[test]
    fn test_parse_prefix_list() {
        assert_eq!(
            parse_prefix_list(" /a ; ;/b/c;"),
            vec!["/a".to_string(), "/b/c".to_string()]
        );
        assert!(parse_prefix_list("").is_empty());
    }
}
