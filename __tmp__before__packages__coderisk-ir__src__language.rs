use std::path::Path;

/// Languages the AST parser layer understands, per the parser contract's
/// "supported languages" clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Go,
    Python,
    TypeScript,
    JavaScript,
}

impl Language {
    /// Detects a language from a file extension. Returns `None` for
    /// anything outside the supported set, which callers treat as
    /// "skip, not error" per the AST parser's failure-isolation contract.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("go") => Some(Language::Go),
            Some("py") => Some(Language::Python),
            Some("ts") | Some("tsx") => Some(Language::TypeScript),
            Some("js") | Some("jsx") | Some("mjs") => Some(Language::JavaScript),
            _ => None,
        }
    }

    pub fn ts_language(self) -> tree_sitter::Language {
        match self {
            Language::Go => tree_sitter_go::language(),
            Language::Python => tree_sitter_python::language(),
            Language::TypeScript => tree_sitter_typescript::language_typescript(),
            Language::JavaScript => tree_sitter_javascript::language(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Go => "go",
            Language::Python => "python",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
        }
    }
}


