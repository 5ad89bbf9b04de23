//! Loads the listing corpus that grounds every exchange.
//!
//! A data path is either a single text file, read verbatim, or a directory
//! whose matching entries are concatenated in lexicographic order, each
//! wrapped in `START/END OF FILE` markers. Failures never raise: they collapse
//! into [`Corpus::NotLoaded`] so callers can treat a missing corpus as a
//! standing condition.

use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

pub const DEFAULT_EXTENSION: &str = "txt";
pub const DEFAULT_MAX_SOURCES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    pub extension: String,
    pub max_sources: usize,
    pub max_source_bytes: Option<u64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            max_sources: DEFAULT_MAX_SOURCES,
            max_source_bytes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Corpus {
    Loaded { sources: Vec<String>, text: String },
    NotLoaded,
}

impl Corpus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Loaded { text, .. } => Some(text),
            Self::NotLoaded => None,
        }
    }

    /// Names of the accepted sources, in the order they were appended.
    pub fn sources(&self) -> &[String] {
        match self {
            Self::Loaded { sources, .. } => sources,
            Self::NotLoaded => &[],
        }
    }
}

pub fn load(path: &Path, config: &LoaderConfig) -> Corpus {
    if path.is_dir() {
        load_directory(path, config)
    } else if path.is_file() {
        load_single_file(path)
    } else {
        error!(path = %path.display(), "data path was not found");
        Corpus::NotLoaded
    }
}

fn load_single_file(path: &Path) -> Corpus {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            error!(path = %path.display(), %err, "failed to read data file");
            return Corpus::NotLoaded;
        }
    };

    if text.is_empty() {
        error!(path = %path.display(), "data file is empty");
        return Corpus::NotLoaded;
    }

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    info!(source = %name, "loaded single data file");

    Corpus::Loaded {
        sources: vec![name],
        text,
    }
}

fn load_directory(dir: &Path, config: &LoaderConfig) -> Corpus {
    let names = match matching_entries(dir, &config.extension) {
        Ok(names) => names,
        Err(err) => {
            error!(path = %dir.display(), %err, "failed to list data folder");
            return Corpus::NotLoaded;
        }
    };

    let mut sources = Vec::new();
    let mut text = String::new();

    for name in names {
        if sources.len() >= config.max_sources {
            warn!(
                source = %name,
                max_sources = config.max_sources,
                "maximum source count reached, skipping"
            );
            continue;
        }

        let path = dir.join(&name);
        let size = match fs::metadata(&path) {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                warn!(source = %name, %err, "unable to stat source, skipping");
                continue;
            }
        };

        if size == 0 {
            info!(source = %name, "skipping empty source");
            continue;
        }

        if let Some(limit) = config.max_source_bytes
            && size > limit
        {
            warn!(source = %name, size, limit, "source exceeds size limit, skipping");
            continue;
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                warn!(source = %name, %err, "unable to read source, skipping");
                continue;
            }
        };

        text.push_str(&wrap_source(&name, &content));
        sources.push(name);
    }

    if sources.is_empty() {
        error!(
            path = %dir.display(),
            extension = %config.extension,
            "no non-empty sources found in data folder"
        );
        return Corpus::NotLoaded;
    }

    info!(count = sources.len(), path = %dir.display(), "concatenated data sources");
    Corpus::Loaded { sources, text }
}

fn matching_entries(dir: &Path, extension: &str) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

fn wrap_source(name: &str, content: &str) -> String {
    format!("\n--- START OF FILE: {name} ---\n{content}\n--- END OF FILE: {name} ---\n")
}

#[cfg(test)]
mod tests {
    use super::{Corpus, LoaderConfig, load};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn directory_sources_are_wrapped_in_lexicographic_order() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("b.txt"), "beta").expect("write b");
        fs::write(dir.path().join("a.txt"), "alpha").expect("write a");

        let corpus = load(dir.path(), &LoaderConfig::default());

        assert_eq!(corpus.sources(), ["a.txt", "b.txt"]);
        let text = corpus.text().expect("loaded");
        insta::assert_snapshot!(text.trim(), @r"
        --- START OF FILE: a.txt ---
        alpha
        --- END OF FILE: a.txt ---

        --- START OF FILE: b.txt ---
        beta
        --- END OF FILE: b.txt ---
        ");
    }

    #[test]
    fn every_source_appears_exactly_once() {
        let dir = tempdir().expect("tempdir");
        for (name, body) in [("3.txt", "three"), ("1.txt", "one"), ("2.txt", "two")] {
            fs::write(dir.path().join(name), body).expect("write source");
        }

        let corpus = load(dir.path(), &LoaderConfig::default());
        let text = corpus.text().expect("loaded");

        for body in ["one", "two", "three"] {
            assert_eq!(text.matches(body).count(), 1, "{body} should appear once");
        }
        let one = text.find("one").expect("one");
        let two = text.find("two").expect("two");
        let three = text.find("three").expect("three");
        assert!(one < two && two < three);
    }

    #[test]
    fn sources_beyond_the_limit_are_skipped() {
        let dir = tempdir().expect("tempdir");
        for idx in 1..=7 {
            fs::write(dir.path().join(format!("{idx}.txt")), format!("listing {idx}"))
                .expect("write source");
        }

        let corpus = load(dir.path(), &LoaderConfig::default());

        assert_eq!(corpus.sources(), ["1.txt", "2.txt", "3.txt", "4.txt", "5.txt"]);
        let text = corpus.text().expect("loaded");
        assert!(!text.contains("listing 6"));
        assert!(!text.contains("listing 7"));
    }

    #[test]
    fn empty_sources_do_not_count_toward_the_limit() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("a.txt"), "").expect("write empty");
        fs::write(dir.path().join("b.txt"), "bravo").expect("write b");
        fs::write(dir.path().join("c.txt"), "charlie").expect("write c");

        let config = LoaderConfig {
            max_sources: 2,
            ..LoaderConfig::default()
        };
        let corpus = load(dir.path(), &config);

        assert_eq!(corpus.sources(), ["b.txt", "c.txt"]);
    }

    #[test]
    fn non_matching_extensions_are_ignored() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("notes.md"), "markdown").expect("write md");
        fs::write(dir.path().join("listing.txt"), "house").expect("write txt");
        fs::create_dir(dir.path().join("nested.txt")).expect("create dir");

        let corpus = load(dir.path(), &LoaderConfig::default());

        assert_eq!(corpus.sources(), ["listing.txt"]);
        assert!(!corpus.text().expect("loaded").contains("markdown"));
    }

    #[test]
    fn oversized_sources_are_skipped_when_limit_is_set() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("big.txt"), "x".repeat(64)).expect("write big");
        fs::write(dir.path().join("small.txt"), "tiny").expect("write small");

        let config = LoaderConfig {
            max_source_bytes: Some(16),
            ..LoaderConfig::default()
        };
        let corpus = load(dir.path(), &config);

        assert_eq!(corpus.sources(), ["small.txt"]);
    }

    #[test]
    fn missing_path_and_empty_directory_yield_the_same_sentinel() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("empty.txt"), "").expect("write empty");
        fs::write(dir.path().join("other.csv"), "a,b").expect("write csv");

        let empty = load(dir.path(), &LoaderConfig::default());
        let missing = load(&dir.path().join("absent"), &LoaderConfig::default());

        assert_eq!(empty, Corpus::NotLoaded);
        assert_eq!(missing, Corpus::NotLoaded);
        assert_eq!(empty, missing);
        assert!(!missing.is_loaded());
    }

    #[test]
    fn single_file_is_read_verbatim() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("data_listing.txt");
        fs::write(&path, "Villa Sunset\nPrice: 2B\n").expect("write listing");

        let corpus = load(&path, &LoaderConfig::default());

        assert_eq!(
            corpus,
            Corpus::Loaded {
                sources: vec!["data_listing.txt".to_string()],
                text: "Villa Sunset\nPrice: 2B\n".to_string(),
            }
        );
    }

    #[test]
    fn empty_single_file_is_not_loaded() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("data_listing.txt");
        fs::write(&path, "").expect("write listing");

        assert_eq!(load(&path, &LoaderConfig::default()), Corpus::NotLoaded);
    }
}
