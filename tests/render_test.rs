use backfill::error::Error;
use backfill::renderer::{TemplateEngine, TemplateRenderer};
use backfill::{render, render_writer};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test_log::test]
fn test_render_expressions() {
    let data = json!({"user": {"name": "Barry", "age": 42, "admin": false}});
    assert_eq!(
        render("{{user.name}} ({{ user.age }}, admin: {{user.admin}})", &data).unwrap(),
        "Barry (42, admin: false)"
    );
}

#[test]
fn test_render_escaping() {
    assert_eq!(render("Hello\\{{World", &json!({})).unwrap(), "Hello{{World");
    assert_eq!(
        render("Hello\\{\\{World", &json!({})).unwrap(),
        "Hello\\{\\{World"
    );
    assert_eq!(render("Hello\\{[World", &json!({})).unwrap(), "Hello{[World");
    assert_eq!(render("C:\\dir", &json!({})).unwrap(), "C:\\dir");
}

#[test]
fn test_missing_and_null_values() {
    let data = json!({"gone": null, "list": []});
    assert_eq!(render("<{{nope}}|{{gone}}|{{list[3]}}>", &data).unwrap(), "<||>");
}

#[test_log::test]
fn test_render_loops() {
    let data = json!({"colors": ["red", "green", "blue"]});
    assert_eq!(
        render("Colors: {[colors|color]}{{color}},{[]}.", &data).unwrap(),
        "Colors: red,green,blue,."
    );
}

#[test]
fn test_render_list_index() {
    let data = json!({"theList": [{"name": "Barry"}, {"name": "Alice"}]});
    assert_eq!(
        render("Hi {{theList[1].name}} and {{theList[0].name}}", &data).unwrap(),
        "Hi Alice and Barry"
    );
}

#[test]
fn test_loop_over_non_list() {
    let data = json!({"colors": {"red": 1}});
    assert!(matches!(
        render("{[colors|c]}{{c}}{[]}", &data),
        Err(Error::EvaluationError(_))
    ));
}

#[test]
fn test_unbalanced_tags() {
    assert!(matches!(
        render("{[colors|c]}{{c}}", &json!({})),
        Err(Error::ParseError(_))
    ));
    assert!(matches!(
        render("{{c}}{[c]}", &json!({})),
        Err(Error::ParseError(_))
    ));
    assert!(matches!(
        render("{[xs|x]}{{x}}{[y]}", &json!({})),
        Err(Error::ParseError(_))
    ));
}

#[test]
fn test_render_writer() {
    let data = json!({"lines": ["one", "two"]});
    let mut out = Vec::new();
    render_writer(
        "{[lines|line]}- {{line}}\n{[line]}".as_bytes(),
        &data,
        &mut out,
    )
    .unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "- one\n- two\n");
}

#[test]
fn test_engine_with_small_text_tokens() {
    let engine = TemplateEngine::with_options(backfill::config::Options {
        max_text_token_len: 2,
        ..Default::default()
    });
    assert_eq!(
        engine
            .render("A long literal around {{x}} stays whole", &json!({"x": 1}))
            .unwrap(),
        "A long literal around 1 stays whole"
    );
}
