use crate::error::{IrError, Result};
use crate::language::Language;

/// A thin wrapper around a `tree_sitter::Parser` configured for one
/// language. Tree-sitter parsers are not `Send`/`Sync`-stable across
/// languages, so one is created per parse call rather than pooled.
pub struct LanguageParser {
    language: Language,
}

impl LanguageParser {
    pub fn new(language: Language) -> Self {
        LanguageParser { language }
    }

    pub fn parse(&self, path: &str, source: &str) -> Result<tree_sitter::Tree> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(self.language.ts_language())
            .map_err(|e| IrError::parse(path, e.to_string()))?;
        parser
            .parse(source, None)
            .ok_or_else(|| IrError::parse(path, "tree-sitter returned no tree"))
    }
}
