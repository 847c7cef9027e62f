use std::collections::HashSet;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Behavioral,
    ConfigOnly,
    DocOnly,
    WhitespaceOnly,
    TestOnly,
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classification produced no kinds for {0}, which should never happen")]
    Empty(String),
}

const DOC_EXTENSIONS: &[&str] = &["md", "mdx", "txt", "rst", "adoc"];
const CONFIG_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "toml", "ini", "cfg", "env"];

/// Classifies one changed file's diff into one or more kinds (component
/// C7). The result is never empty -- if nothing more specific applies, the
/// change is `Behavioral` by default, since "unclassifiable" is not a safe
/// default for a risk tool to fall silent on.
pub fn classify_file(path: &str, before: Option<&str>, after: &str) -> Result<Vec<ChangeKind>, ClassifyError> {
    let mut kinds = HashSet::new();
    let ext = path.rsplit('.').next().unwrap_or("").to_lowercase();

    if coderisk_ir::is_test_path(path) {
        kinds.insert(ChangeKind::TestOnly);
    }
    if DOC_EXTENSIONS.contains(&ext.as_str()) {
        kinds.insert(ChangeKind::DocOnly);
    }
    if CONFIG_EXTENSIONS.contains(&ext.as_str()) {
        kinds.insert(ChangeKind::ConfigOnly);
    }

    if kinds.is_empty() {
        if let Some(before) = before {
            if only_whitespace_differs(before, after) {
                kinds.insert(ChangeKind::WhitespaceOnly);
            } else {
                // Whether the symbol surface changed or only a function
                // body did, both still count as behavioral: logic inside
                // an unchanged signature can still shift runtime behavior.
                kinds.insert(ChangeKind::Behavioral);
            }
        } else {
            kinds.insert(ChangeKind::Behavioral);
        }
    }

    if kinds.is_empty() {
        return Err(ClassifyError::Empty(path.to_string()));
    }

    let mut out: Vec<ChangeKind> = kinds.into_iter().collect();
    out.sort_by_key(|k| format!("{k:?}"));
    Ok(out)
}

fn only_whitespace_differs(before: &str, after: &str) -> bool {
    let strip = |s: &str| s.split_whitespace().collect::<Vec<_>>();
    before != after && strip(before) == strip(after)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_doc_files() {
        let kinds = classify_file("README.md", Some("old"), "new").unwrap();
        assert!(kinds.contains(&ChangeKind::DocOnly));
    }

    #[test]
    fn classifies_config_files() {
        let kinds = classify_file("config.yaml", Some("a: 1"), "a: 2").unwrap();
        assert!(kinds.contains(&ChangeKind::ConfigOnly));
    }

    #[test]
    fn classifies_test_files() {
        let kinds = classify_file("pkg/foo_test.go", Some("x"), "y").unwrap();
        assert!(kinds.contains(&ChangeKind::TestOnly));
    }

    #[test]
    fn classifies_whitespace_only_changes() {
        let before = "def foo():\n    return 1\n";
        let after = "def foo():\n\n    return 1\n";
        let kinds = classify_file("pkg/mod.py", Some(before), after).unwrap();
        assert_eq!(kinds, vec![ChangeKind::WhitespaceOnly]);
    }

    #[test]
    fn classifies_behavioral_changes_by_default() {
        let before = "def foo():\n    return 1\n";
        let after = "def foo():\n    return 2\n";
        let kinds = classify_file("pkg/mod.py", Some(before), after).unwrap();
        assert_eq!(kinds, vec![ChangeKind::Behavioral]);
    }

    #[test]
    fn new_file_without_before_is_behavioral() {
        let kinds = classify_file("pkg/new.py", None, "def foo():\n    pass\n").unwrap();
        assert_eq!(kinds, vec![ChangeKind::Behavioral]);
    }
}


