use std::collections::BTreeMap;

use thiserror::Error;

pub const PAGE_EXTENSION: &str = "html";

/// Local filename for a page title: `{sanitized_title}.html`.
pub fn page_filename(title: &str) -> String {
    format!("{}.{PAGE_EXTENSION}", sanitize_title(title))
}

/// Replace the characters that are unsafe in a page's file stem with `_`.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if matches!(c, ' ' | ':' | '/') { '_' } else { c })
        .collect()
}

/// Images keep their bare name; only path separators are replaced so the
/// file always lands inside the image directory.
pub fn image_filename(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect()
}

/// Strip a namespace prefix (`File:`, or a localized alias) from a title.
pub fn bare_image_name(title: &str) -> &str {
    title.split_once(':').map_or(title, |(_, bare)| bare)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pages {existing:?} and {incoming:?} both map to {filename}")]
pub struct FilenameCollision {
    pub filename: String,
    pub existing: String,
    pub incoming: String,
}

/// Tracks which title owns each page filename written during one export.
#[derive(Debug, Default)]
pub struct FilenameRegistry {
    owners: BTreeMap<String, String>,
}

impl FilenameRegistry {
    pub fn claim(&mut self, filename: &str, title: &str) -> Result<(), FilenameCollision> {
        match self.owners.get(filename) {
            Some(existing) if existing != title => Err(FilenameCollision {
                filename: filename.to_string(),
                existing: existing.clone(),
                incoming: title.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.owners.insert(filename.to_string(), title.to_string());
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        FilenameRegistry, bare_image_name, image_filename, page_filename, sanitize_title,
    };

    #[test]
    fn unsafe_title_characters_become_underscores() {
        assert_eq!(sanitize_title("Help:Getting started/FAQ"), "Help_Getting_started_FAQ");
        assert_eq!(page_filename("Main Page"), "Main_Page.html");
        assert_eq!(page_filename("Some_Page"), "Some_Page.html");
    }

    #[test]
    fn sanitizing_is_idempotent() {
        for title in ["A:B", "A/B C", "Plain", "  spaced :/ out  ", ""] {
            let once = sanitize_title(title);
            assert_eq!(sanitize_title(&once), once);
            assert!(!once.contains([' ', ':', '/']));
        }
    }

    #[test]
    fn image_names_only_lose_path_separators() {
        assert_eq!(image_filename("Foo bar.png"), "Foo bar.png");
        assert_eq!(image_filename("../etc/x.png"), ".._etc_x.png");
        assert_eq!(bare_image_name("File:Foo.png"), "Foo.png");
        assert_eq!(bare_image_name("Datei:Foo.png"), "Foo.png");
        assert_eq!(bare_image_name("Foo.png"), "Foo.png");
    }

    #[test]
    fn registry_rejects_second_title_for_same_file() {
        let mut registry = FilenameRegistry::default();
        registry.claim(&page_filename("A:B"), "A:B").expect("first claim");
        registry
            .claim(&page_filename("A:B"), "A:B")
            .expect("same title may re-claim");

        let collision = registry
            .claim(&page_filename("A/B"), "A/B")
            .expect_err("collision");
        assert_eq!(collision.filename, "A_B.html");
        assert_eq!(collision.existing, "A:B");
        assert_eq!(collision.incoming, "A/B");
        assert_eq!(registry.len(), 1);
    }
}
