use tree_sitter::Node as TsNode;

use crate::language::Language;
use crate::model::{Edge, EdgeKind, FileGraph, Node, NodeKind, Span};
use crate::parser::LanguageParser;
use crate::error::Result;

/// Per-language tree-sitter node-kind names for the constructs the graph
/// cares about. Each language's grammar names these differently, so the
/// mapping is a small data table rather than a big match per language.
struct NodeKindTable {
    function: &'static [&'static str],
    class: &'static [&'static str],
    import: &'static [&'static str],
    call: &'static [&'static str],
    /// Field name (or first identifier child) holding a definition's name.
    name_field: &'static str,
}

fn kind_table(lang: Language) -> NodeKindTable {
    match lang {
        Language::Go => NodeKindTable {
            function: &["function_declaration", "method_declaration"],
            class: &["type_declaration"],
            import: &["import_spec"],
            call: &["call_expression"],
            name_field: "name",
        },
        Language::Python => NodeKindTable {
            function: &["function_definition"],
            class: &["class_definition"],
            import: &["import_statement", "import_from_statement"],
            call: &["call"],
            name_field: "name",
        },
        Language::TypeScript => NodeKindTable {
            function: &["function_declaration", "method_definition"],
            class: &["class_declaration"],
            import: &["import_statement"],
            call: &["call_expression"],
            name_field: "name",
        },
        Language::JavaScript => NodeKindTable {
            function: &["function_declaration", "method_definition"],
            class: &["class_declaration"],
            import: &["import_statement"],
            call: &["call_expression"],
            name_field: "name",
        },
    }
}

/// Walks one file's parsed AST and produces the `File`/`Function`/`Class`
/// nodes and `CONTAINS`/`IMPORTS`/`CALLS` edges the data model defines.
/// A parse failure for one file is isolated here: callers get `Err`, which
/// they record as a skipped file rather than propagate.
pub struct GraphBuilder;

impl GraphBuilder {
    pub fn build_file(repo_path: &str, language: Language, source: &str) -> Result<FileGraph> {
        let parser = LanguageParser::new(language);
        let tree = parser.parse(repo_path, source)?;
        let table = kind_table(language);

        let mut graph = FileGraph::default();
        let file_id = repo_path.to_string();
        graph.nodes.push(
            Node::new(NodeKind::File, file_id.clone())
                .with_attr("language", language.as_str()),
        );

        // Scope stack: qualified-name prefix of the enclosing function/class,
        // used to build dotted ids for nested definitions.
        let mut scopes: Vec<String> = vec![file_id.clone()];

        walk(
            tree.root_node(),
            source.as_bytes(),
            &table,
            &mut scopes,
            &file_id,
            &mut graph,
        );

        Ok(graph)
    }
}

fn node_text<'a>(node: TsNode<'a>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

fn span_of(node: TsNode) -> Span {
    Span {
        start_line: node.start_position().row as u32 + 1,
        end_line: node.end_position().row as u32 + 1,
    }
}

fn definition_name<'a>(node: TsNode<'a>, source: &'a [u8], name_field: &str) -> Option<&'a str> {
    if let Some(n) = node.child_by_field_name(name_field) {
        return Some(node_text(n, source));
    }
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .find(|c| c.kind() == "identifier" || c.kind() == "type_identifier")
        .map(|c| node_text(c, source))
}

fn walk(
    node: TsNode,
    source: &[u8],
    table: &NodeKindTable,
    scopes: &mut Vec<String>,
    file_id: &str,
    graph: &mut FileGraph,
) {
    let kind = node.kind();

    if table.function.contains(&kind) {
        if let Some(name) = definition_name(node, source, table.name_field) {
            let qualified = format!("{}::{}", scopes.last().unwrap(), name);
            graph.nodes.push(
                Node::new(NodeKind::Function, qualified.clone()).with_span(span_of(node)),
            );
            let parent = scopes.last().unwrap().clone();
            graph
                .edges
                .push(Edge::new(EdgeKind::Contains, parent, qualified.clone()));
            scopes.push(qualified);
            walk_children(node, source, table, scopes, file_id, graph);
            scopes.pop();
            return;
        }
    }

    if table.class.contains(&kind) {
        if let Some(name) = definition_name(node, source, table.name_field) {
            let qualified = format!("{}::{}", scopes.last().unwrap(), name);
            graph
                .nodes
                .push(Node::new(NodeKind::Class, qualified.clone()).with_span(span_of(node)));
            let parent = scopes.last().unwrap().clone();
            graph
                .edges
                .push(Edge::new(EdgeKind::Contains, parent, qualified.clone()));
            scopes.push(qualified);
            walk_children(node, source, table, scopes, file_id, graph);
            scopes.pop();
            return;
        }
    }

    if table.import.contains(&kind) {
        let target = node_text(node, source).trim().to_string();
        graph
            .edges
            .push(Edge::new(EdgeKind::Imports, file_id.to_string(), target));
    }

    if table.call.contains(&kind) {
        if let Some(callee) = node.child_by_field_name("function").or_else(|| node.child(0)) {
            let callee_name = node_text(callee, source).to_string();
            let caller = scopes.last().unwrap().clone();
            graph
                .edges
                .push(Edge::new(EdgeKind::Calls, caller, callee_name));
        }
    }

    walk_children(node, source, table, scopes, file_id, graph);
}

fn walk_children(
    node: TsNode,
    source: &[u8],
    table: &NodeKindTable,
    scopes: &mut Vec<String>,
    file_id: &str,
    graph: &mut FileGraph,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, table, scopes, file_id, graph);
    }
}

/// Best-effort test-file detection, reusing the repo's own convention of
/// matching on language-specific suffixes/prefixes rather than content
/// sniffing. Used by the ingestion orchestrator to flag `TESTS` edges and
/// by the change classifier.
pub fn is_test_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.ends_with("_test.go")
        || lower.ends_with("_test.py")
        || lower.starts_with("test_")
        || lower.contains("/test_")
        || lower.ends_with(".test.ts")
        || lower.ends_with(".test.js")
        || lower.ends_with(".spec.ts")
        || lower.ends_with(".spec.js")
        || lower.contains("/tests/")
        || lower.contains("/__tests__/")
}


