// Built-in grammar tables
//
// Node kinds follow each grammar's node-types.json; a rule only fires when
// the node has a readable name.

use std::collections::BTreeMap;

use super::{GrammarSpec, Naming, NodeRule};
use crate::extractors::base::ElementKind;
use crate::language::get_tree_sitter_language;

use ElementKind::*;

/// Ids of the grammar tables shipped with the crate
pub const BUILTIN_GRAMMARS: &[&str] = &[
    "python",
    "rust",
    "go",
    "javascript",
    "typescript",
    "tsx",
    "java",
    "c",
    "cpp",
    "csharp",
    "php",
    "ruby",
    "swift",
    "kotlin",
    "lua",
    "zig",
    "gdscript",
    "bash",
];

fn rule(node_kind: &str, kind: ElementKind) -> NodeRule {
    NodeRule::new(node_kind, kind.default_category(), kind)
}

fn import(node_kind: &str) -> NodeRule {
    rule(node_kind, Import).named_by(Naming::FirstLine)
}

/// Table for a built-in grammar id
pub fn builtin_grammar(id: &str) -> Option<GrammarSpec> {
    let spec = match id {
        "python" => GrammarSpec::new("python", "python")
            .rule(import("import_statement"))
            .rule(import("import_from_statement"))
            .rule(rule("class_definition", Class))
            .rule(rule("function_definition", Function)),

        "rust" => GrammarSpec::new("rust", "rust")
            .rule(import("use_declaration"))
            .rule(rule("mod_item", Module))
            .rule(rule("struct_item", Struct))
            .rule(rule("enum_item", Enum))
            .rule(rule("union_item", Struct))
            .rule(rule("trait_item", Trait))
            .rule(rule("impl_item", Impl).named_by(Naming::ImplHeader))
            .rule(rule("type_item", Type))
            .rule(rule("const_item", Constant))
            .rule(rule("static_item", Constant))
            .rule(rule("function_item", Function))
            .rule(rule("function_signature_item", Function)),

        "go" => GrammarSpec::new("go", "go")
            .rule(import("import_declaration"))
            .rule(rule("type_spec", Type))
            .rule(rule("function_declaration", Function))
            .rule(rule("method_declaration", Method)),

        "javascript" => with_js_rules(GrammarSpec::new("javascript", "javascript")),

        "typescript" | "tsx" => with_js_rules(GrammarSpec::new(id, id))
            .rule(rule("abstract_class_declaration", Class))
            .rule(rule("interface_declaration", Interface))
            .rule(rule("type_alias_declaration", Type))
            .rule(rule("enum_declaration", Enum))
            .rule(rule("internal_module", Module))
            .rule(rule("function_signature", Function))
            .rule(rule("method_signature", Function)),

        "java" => GrammarSpec::new("java", "java")
            .rule(import("import_declaration"))
            .rule(rule("class_declaration", Class))
            .rule(rule("record_declaration", Class))
            .rule(rule("interface_declaration", Interface))
            .rule(rule("annotation_type_declaration", Interface))
            .rule(rule("enum_declaration", Enum))
            .rule(rule("constructor_declaration", Function))
            .rule(rule("method_declaration", Function)),

        "c" => with_c_rules(GrammarSpec::new("c", "c")),

        "cpp" => with_c_rules(GrammarSpec::new("cpp", "cpp"))
            .rule(rule("class_specifier", Class).requires_field("body", &[]))
            .rule(rule("namespace_definition", Module)),

        "csharp" => GrammarSpec::new("csharp", "csharp")
            .rule(import("using_directive"))
            .rule(rule("namespace_declaration", Module))
            .rule(rule("file_scoped_namespace_declaration", Module))
            .rule(rule("class_declaration", Class))
            .rule(rule("record_declaration", Class))
            .rule(rule("struct_declaration", Struct))
            .rule(rule("interface_declaration", Interface))
            .rule(rule("enum_declaration", Enum))
            .rule(rule("constructor_declaration", Function))
            .rule(rule("method_declaration", Function)),

        "php" => GrammarSpec::new("php", "php")
            .rule(import("namespace_use_declaration"))
            .rule(rule("namespace_definition", Module))
            .rule(rule("class_declaration", Class))
            .rule(rule("interface_declaration", Interface))
            .rule(rule("trait_declaration", Trait))
            .rule(rule("enum_declaration", Enum))
            .rule(rule("function_definition", Function))
            .rule(rule("method_declaration", Function)),

        "ruby" => GrammarSpec::new("ruby", "ruby")
            .rule(rule("module", Module))
            .rule(rule("class", Class))
            .rule(rule("method", Function))
            .rule(rule("singleton_method", Function)),

        "swift" => GrammarSpec::new("swift", "swift")
            .rule(import("import_declaration"))
            .rule(rule("class_declaration", Class))
            .rule(rule("protocol_declaration", Interface))
            .rule(rule("function_declaration", Function))
            .rule(rule("protocol_function_declaration", Function))
            .rule(rule("init_declaration", Function).named_by(Naming::Literal("init".into()))),

        "kotlin" => GrammarSpec::new("kotlin", "kotlin")
            .rule(import("import"))
            .rule(import("import_header"))
            .rule(rule("class_declaration", Class))
            .rule(rule("object_declaration", Class))
            .rule(rule("function_declaration", Function)),

        "lua" => GrammarSpec::new("lua", "lua").rule(rule("function_declaration", Function)),

        "zig" => GrammarSpec::new("zig", "zig")
            .rule(rule("function_declaration", Function))
            .rule(NodeRule::new("test_declaration", "tests", Function).named_by(Naming::FirstLine)),

        "gdscript" => GrammarSpec::new("gdscript", "gdscript")
            .rule(rule("class_name_statement", Class))
            .rule(rule("class_definition", Class))
            .rule(rule("signal_statement", Signal))
            .rule(rule("enum_definition", Enum))
            .rule(rule("const_statement", Constant))
            .rule(rule("function_definition", Function))
            .rule(
                rule("constructor_definition", Function)
                    .named_by(Naming::Literal("_init".into())),
            ),

        "bash" => GrammarSpec::new("bash", "bash").rule(rule("function_definition", Function)),

        _ => return None,
    };
    Some(spec)
}

fn with_js_rules(spec: GrammarSpec) -> GrammarSpec {
    spec.rule(import("import_statement"))
        .rule(rule("class_declaration", Class))
        .rule(rule("class", Class))
        .rule(rule("function_declaration", Function))
        .rule(rule("generator_function_declaration", Function))
        .rule(rule("method_definition", Function))
        .rule(
            rule("variable_declarator", Function)
                .requires_field(
                    "value",
                    &["arrow_function", "function_expression", "function"],
                )
                .signature_from("value"),
        )
}

fn with_c_rules(spec: GrammarSpec) -> GrammarSpec {
    spec.rule(import("preproc_include"))
        .rule(rule("struct_specifier", Struct).requires_field("body", &[]))
        .rule(rule("union_specifier", Struct).requires_field("body", &[]))
        .rule(rule("enum_specifier", Enum).requires_field("body", &[]))
        .rule(rule("type_definition", Type).named_by(Naming::Declarator))
        .rule(rule("function_definition", Function).named_by(Naming::Declarator))
}

/// Table built from a user `[[analyzers]]` entry: category -> node kinds
///
/// Fails when the grammar is not bundled or no node kinds are given.
pub fn custom_grammar(
    id: &str,
    grammar: &str,
    categories: &BTreeMap<String, Vec<String>>,
) -> anyhow::Result<GrammarSpec> {
    get_tree_sitter_language(grammar)?;
    if categories.values().all(|kinds| kinds.is_empty()) {
        anyhow::bail!("analyzer '{}' maps no node kinds", id);
    }

    let mut spec = GrammarSpec::new(id, grammar);
    for (category, node_kinds) in categories {
        let kind = ElementKind::from_string(category).unwrap_or(Section);
        for node_kind in node_kinds {
            spec = spec.rule(NodeRule::new(node_kind, category, kind));
        }
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::base::Extractor;
    use crate::extractors::syntax_tree::SyntaxTreeExtractor;
    use crate::source::Source;
    use std::sync::Arc;

    fn names(grammar: &str, path: &str, code: &str, category: &str) -> Vec<String> {
        let spec = builtin_grammar(grammar).unwrap();
        let extractor = SyntaxTreeExtractor::new(&spec, Arc::new(Source::from_text(path, code)));
        extractor
            .structure()
            .get(category)
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    #[test]
    fn test_every_builtin_grammar_has_a_table() {
        for id in BUILTIN_GRAMMARS {
            let spec = builtin_grammar(id).unwrap();
            assert!(!spec.rules.is_empty());
            assert!(get_tree_sitter_language(&spec.grammar).is_ok());
        }
    }

    #[test]
    fn test_go_types_and_methods() {
        let code = "package main\n\nimport \"fmt\"\n\ntype Server struct{}\n\nfunc (s *Server) Serve(a, b int) error {\n\treturn nil\n}\n\nfunc main() {\n\tfmt.Println(1)\n}\n";
        assert_eq!(names("go", "main.go", code, "types"), vec!["Server"]);
        assert_eq!(names("go", "main.go", code, "functions"), vec!["Serve", "main"]);

        let spec = builtin_grammar("go").unwrap();
        let extractor = SyntaxTreeExtractor::new(&spec, Arc::new(Source::from_text("main.go", code)));
        let structure = extractor.structure();
        let serve = &structure.get("functions")[0];
        assert_eq!(serve.metadata.parameter_count, Some(2));
        assert_eq!(serve.metadata.signature.as_deref(), Some("(a, b int) -> error"));
    }

    #[test]
    fn test_typescript_interfaces_and_classes() {
        let code = "interface Shape { area(): number }\n\nexport class Circle implements Shape {\n  constructor(private r: number) {}\n  area(): number { return 3.14 * this.r * this.r; }\n}\n";
        assert_eq!(names("typescript", "shape.ts", code, "interfaces"), vec!["Shape"]);
        assert_eq!(names("typescript", "shape.ts", code, "classes"), vec!["Circle"]);
        let functions = names("typescript", "shape.ts", code, "functions");
        assert!(functions.contains(&"constructor".to_string()));
        assert!(functions.contains(&"area".to_string()));
    }

    #[test]
    fn test_ruby_and_bash() {
        let ruby = "module Shop\n  class Cart\n    def add(item)\n      @items << item\n    end\n  end\nend\n";
        assert_eq!(names("ruby", "cart.rb", ruby, "modules"), vec!["Shop"]);
        assert_eq!(names("ruby", "cart.rb", ruby, "classes"), vec!["Cart"]);
        assert_eq!(names("ruby", "cart.rb", ruby, "functions"), vec!["add"]);

        let bash = "#!/bin/bash\nsetup() {\n  echo hi\n}\nfunction deploy {\n  setup\n}\n";
        assert_eq!(names("bash", "run.sh", bash, "functions"), vec!["setup", "deploy"]);
    }

    #[test]
    fn test_custom_grammar_from_category_table() {
        let mut categories = BTreeMap::new();
        categories.insert(
            "handlers".to_string(),
            vec!["function_definition".to_string()],
        );
        let spec = custom_grammar("pyhandlers", "python", &categories).unwrap();
        let extractor = SyntaxTreeExtractor::new(
            &spec,
            Arc::new(Source::from_text("h.py", "def on_start():\n    pass\n")),
        );
        let structure = extractor.structure();
        assert_eq!(structure.get("handlers")[0].name, "on_start");
        assert_eq!(extractor.id(), "pyhandlers");

        assert!(custom_grammar("x", "cobol", &categories).is_err());
        assert!(custom_grammar("x", "python", &BTreeMap::new()).is_err());
    }
}
