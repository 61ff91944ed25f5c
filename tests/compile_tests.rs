//! Compiler behaviour: node tree construction, payloads, and errors.

mod common;

use common::{all_nodes, compile_ok, count_md, fragment};
use hypernote::syntax::MdNode;
use hypernote::{compile, HypernoteError, NodeKind};
use rstest::rstest;
use serde_json::json;

#[test]
fn raw_html_is_rejected() {
    let err = compile("---\nname: Bad\n---\n<div>html</div>").unwrap_err();
    assert!(err.to_string().starts_with("HTML is not supported"));
    match err {
        HypernoteError::UnsupportedHtml { html, span, .. } => {
            assert_eq!(html, "<div>html</div>");
            assert_eq!(span.map(|s| s.offset()), Some(18));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn inline_html_is_rejected_inside_containers() {
    let src = "```hstack.start\n```\n\nsome <span>inline</span> html\n\n```hstack.end\n```\n";
    assert!(matches!(compile(src), Err(HypernoteError::UnsupportedHtml { .. })));
}

#[test]
fn markdown_refs_and_document_dependencies() {
    let src = "---\nqueries:\n  feed:\n    kinds: [1]\n---\nStatus: {{ queries.feed[0].content || user.pubkey }}\n";
    let doc = compile_ok(src);
    assert_eq!(doc.ast.len(), 1);
    let refs = doc.ast[0].refs();
    assert!(refs.contains(&"queries.feed[0].content".to_string()));
    assert!(refs.contains(&"user.pubkey".to_string()));
    assert_eq!(doc.meta.dependencies.queries, vec!["feed"]);
    assert_eq!(doc.meta.dependencies.globals, vec!["user"]);
    assert_eq!(doc.meta.queries["feed"], json!({ "kinds": [1] }));
}

#[test]
fn underscores_inside_templates_never_become_emphasis() {
    let body = "{{ $feed.1.display_name }} - {{ $feed.0.created_at }}";
    let doc = compile_ok(body);
    let md = fragment(&doc.ast[0]);
    assert_eq!(count_md(md, &|n| matches!(n, MdNode::Emphasis { .. })), 0);
    assert_eq!(
        md,
        &[MdNode::Paragraph {
            children: vec![MdNode::text(body)]
        }]
    );
    assert_eq!(doc.ast[0].text(), Some(body));
}

#[test]
fn emphasis_around_a_whole_template_is_kept() {
    let doc = compile_ok("Hello *{{ user.display_name }}*\n");
    let md = fragment(&doc.ast[0]);
    assert_eq!(count_md(md, &|n| matches!(n, MdNode::Emphasis { .. })), 1);
    assert_eq!(doc.ast[0].refs(), ["user.display_name"]);
}

#[test]
fn unknown_fences_become_literal_code() {
    let doc = compile_ok("```js\nconsole.log('hello');\n```\n");
    match &doc.ast[0].kind {
        NodeKind::LiteralCode { data, text } => {
            assert_eq!(data.lang, "js");
            assert_eq!(data.meta, None);
            assert!(text.contains("console.log('hello');"));
        }
        other => panic!("expected literal_code, got {}", other.type_name()),
    }
    assert!(doc.meta.dependencies.queries.is_empty());
}

#[test]
fn literal_code_keeps_templates_verbatim_and_out_of_dependencies() {
    let doc = compile_ok("```html title=\"x\"\n<b>{{ queries.feed }}</b>\n```\n");
    match &doc.ast[0].kind {
        NodeKind::LiteralCode { data, text } => {
            assert_eq!(data.lang, "html");
            assert_eq!(data.meta.as_deref(), Some("title=\"x\""));
            assert_eq!(text, "<b>{{ queries.feed }}</b>\n");
        }
        other => panic!("expected literal_code, got {}", other.type_name()),
    }
    assert!(doc.meta.dependencies.queries.is_empty());
}

#[test]
fn stack_layout_is_normalized_to_pixels() {
    let doc = compile_ok("```hstack.start\nwidth: 80px\nheight: 120\n```\n\nHello\n\n```hstack.end\n```\n");
    match &doc.ast[0].kind {
        NodeKind::Hstack { data, children } => {
            assert_eq!(data["width"], json!("80px"));
            assert_eq!(data["height"], json!("120px"));
            assert_eq!(children.len(), 1);
            assert_eq!(children[0].type_name(), "markdown");
        }
        other => panic!("expected hstack, got {}", other.type_name()),
    }
}

#[test]
fn each_loop_extracts_source_and_alias() {
    let src = "```each.start\nfrom: queries.feed\nas: item\n```\n\n{{ item.content }}\n\n```each.end\n```\n";
    let doc = compile_ok(src);
    match &doc.ast[0].kind {
        NodeKind::Each { data, children } => {
            assert_eq!(data.source, "queries.feed");
            assert_eq!(data.alias, "item");
            assert_eq!(children[0].refs(), ["item.content"]);
        }
        other => panic!("expected each, got {}", other.type_name()),
    }
    assert_eq!(doc.meta.dependencies.queries, vec!["feed"]);
    assert!(doc.meta.dependencies.globals.is_empty());
}

#[rstest]
#[case("```each\n```\n", "queries.items", "item")]
#[case("```each.start\nsource: queries.notes\nas: $note\n```\n", "queries.notes", "note")]
#[case("```Each Start\nfrom: queries.a\n```\n", "queries.a", "item")]
fn each_defaults_and_spellings(#[case] src: &str, #[case] source: &str, #[case] alias: &str) {
    let doc = compile_ok(src);
    let NodeKind::Each { data, .. } = &doc.ast[0].kind else {
        panic!("expected each node");
    };
    assert_eq!((data.source.as_str(), data.alias.as_str()), (source, alias));
}

#[rstest]
#[case("button", "button")]
#[case("input", "input")]
#[case("markdown-editor", "markdown_editor")]
#[case("markdown_editor", "markdown_editor")]
#[case("markdown.viewer", "markdown_viewer")]
fn leaf_directives(#[case] tag: &str, #[case] node_type: &str) {
    let doc = compile_ok(&format!("```{tag}\nname: field\n```\n"));
    assert_eq!(doc.ast.len(), 1);
    assert_eq!(doc.ast[0].type_name(), node_type);
    assert!(doc.ast[0].children().is_empty());
}

#[test]
fn directive_fence_right_after_a_paragraph_is_still_a_directive() {
    let doc = compile_ok("Intro line\n```button\ntext: Go\n```\n");
    let types: Vec<_> = doc.ast.iter().map(|n| n.type_name()).collect();
    assert_eq!(types, vec!["markdown", "button"]);
    assert_eq!(doc.ast[0].text(), Some("Intro line"));
}

#[test]
fn payload_templates_are_restored_and_counted() {
    let src = "```button\ntext: {{ state.count || 0 }}\naction: \"@increment\"\n```\n";
    let doc = compile_ok(src);
    let NodeKind::Button { data } = &doc.ast[0].kind else {
        panic!("expected button");
    };
    assert_eq!(data["text"], json!("{{ state.count || 0 }}"));
    assert_eq!(data["action"], json!("@increment"));
    assert!(doc.ast[0].refs().is_empty());
    assert_eq!(doc.meta.dependencies.globals, vec!["state"]);
}

#[rstest]
#[case("```button\ntext: [unclosed\n```\n", json!({ "text": "[unclosed" }))]
#[case("```button\nClick me\n```\n", json!({ "text": "Click me" }))]
#[case("```button\n```\n", json!({}))]
fn malformed_payloads_fall_back(#[case] src: &str, #[case] expected: serde_json::Value) {
    let doc = compile_ok(src);
    let NodeKind::Button { data } = &doc.ast[0].kind else {
        panic!("expected button");
    };
    assert_eq!(serde_json::Value::Object(data.clone()), expected);
}

#[test]
fn unterminated_containers_are_closed_at_end_of_document() {
    let doc = compile_ok("```hstack.start\n```\n\nA\n\n```vstack.start\n```\n\nB\n");
    assert_eq!(doc.ast.len(), 1);
    let row = &doc.ast[0];
    assert_eq!(row.type_name(), "hstack");
    let children: Vec<_> = row.children().iter().map(|n| n.type_name()).collect();
    assert_eq!(children, vec!["markdown", "vstack"]);
    assert_eq!(row.children()[1].children()[0].text(), Some("B"));
}

#[test]
fn stray_close_fence_at_root_is_ignored() {
    let doc = compile_ok("A\n\n```hstack.end\n```\n\nB\n");
    assert_eq!(doc.ast.len(), 1);
    let NodeKind::Markdown { text, source, .. } = &doc.ast[0].kind else {
        panic!("expected a single markdown run");
    };
    assert_eq!(text, "A\n\nB");
    assert_eq!(source, "A\n\n```hstack.end\n```\n\nB");
}

#[test]
fn ids_are_sequential_and_unique() {
    let src = "# T\n\n```vstack.start\n```\n\nx\n\n```button\n```\n\n```vstack.end\n```\n\ny\n";
    let doc = compile_ok(src);
    let ids: Vec<_> = all_nodes(&doc.ast).iter().map(|n| n.id.clone()).collect();
    assert_eq!(ids, vec!["n1", "n2", "n3", "n4", "n5"]);
}

#[test]
fn only_containers_have_children_and_only_markdown_has_refs() {
    let src = "Hi {{ user.name }}\n\n```hstack.start\n```\n\n```input\nvalue: {{ user.name }}\n```\n\n```hstack.end\n```\n";
    let doc = compile_ok(src);
    for node in all_nodes(&doc.ast) {
        if !node.kind.is_container() {
            assert!(node.children().is_empty());
        }
        if node.type_name() != "markdown" {
            assert!(node.refs().is_empty());
        }
    }
}

#[test]
fn loop_aliases_do_not_become_globals() {
    let src = "```each.start\nfrom: queries.feed\nas: note\n```\n\n{{ note.content }} by {{ user.name }}\n\n```each.end\n```\n";
    let doc = compile_ok(src);
    assert_eq!(doc.meta.dependencies.queries, vec!["feed"]);
    assert_eq!(doc.meta.dependencies.globals, vec!["user"]);
}

#[test]
fn link_and_image_targets_contribute_refs() {
    let src = "[profile](https://example.com/{{ queries.profile.id }}) ![me]({{ user.picture }})\n";
    let doc = compile_ok(src);
    assert_eq!(doc.ast[0].refs(), ["queries.profile.id", "user.picture"]);
    let md = fragment(&doc.ast[0]);
    assert_eq!(
        count_md(md, &|n| matches!(n, MdNode::Image { url, .. } if url == "{{ user.picture }}")),
        1
    );
}

#[test]
fn frontmatter_is_normalized() {
    let src = "---\nname: Demo\nicon: star\nhypernote:\n  name: Kept\n$feed:\n  kinds: [1]\n\"@post\":\n  kind: 1\ndependencies:\n  queries: [stale]\ntheme: dark\n---\n# Body\n";
    let doc = compile_ok(src);
    let meta = &doc.meta;
    assert_eq!(meta.hypernote["name"], json!("Kept"));
    assert_eq!(meta.hypernote["icon"], json!("star"));
    assert_eq!(meta.queries["feed"], json!({ "kinds": [1] }));
    assert_eq!(meta.actions["post"], json!({ "kind": 1 }));
    assert_eq!(meta.extra["theme"], json!("dark"));
    assert!(!meta.extra.contains_key("dependencies"));
    assert!(meta.dependencies.queries.is_empty());
}

#[test]
fn invalid_frontmatter_is_fatal() {
    assert!(matches!(
        compile("---\n- a\n- b\n---\nbody\n"),
        Err(HypernoteError::InvalidFrontmatter { .. })
    ));
}

#[test]
fn legacy_query_references_are_rejected() {
    let src = "---\nqueries:\n  feed:\n    authors: [$follows.pubkeys]\n---\nbody\n";
    let err = compile(src).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("queries.feed.authors[0]"));
    assert!(message.contains("queries.follows.pubkeys"));
}

#[test]
fn legacy_placeholders_on_the_allow_list_pass() {
    let src = "---\nqueries:\n  feed:\n    authors: [$user.pubkey, $contacts]\n  replies:\n    from: $item.id\n---\nbody\n";
    assert!(compile(src).is_ok());
}

#[test]
fn compiled_doc_serializes_to_the_json_contract() {
    let doc = compile_ok("# Hi\n\n```button\ntext: Go\n```\n");
    let value = serde_json::to_value(&doc).unwrap();
    assert_eq!(value["version"], json!("1.1.0"));
    assert_eq!(value["ast"][0]["type"], json!("markdown"));
    assert_eq!(value["ast"][0]["markdown"][0]["type"], json!("heading"));
    assert_eq!(value["ast"][1], json!({ "id": "n2", "type": "button", "data": { "text": "Go" } }));
    assert_eq!(value["meta"]["dependencies"], json!({ "queries": [], "globals": [] }));
}
