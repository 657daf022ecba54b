//! Browser tests, run with `wasm-pack test --headless --firefox crates/mr-wasm`.

#![cfg(target_arch = "wasm32")]

use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_test::*;

use mr_core::dom::{DocumentContext, ElementHandle};
use mr_wasm::{export_rules, import_rules, BrowserDocument, ContentScript};

wasm_bindgen_test_configure!(run_in_browser);

fn document() -> web_sys::Document {
    web_sys::window().and_then(|w| w.document()).expect("document")
}

fn mount(id: &str, html: &str) -> web_sys::Element {
    let doc = document();
    let el = doc.create_element("div").expect("create");
    el.set_id(id);
    el.set_inner_html(html);
    doc.body().expect("body").append_child(&el).expect("append");
    el
}

/// Append an `about:blank` iframe and fill its body. The frame document is
/// same-origin and available synchronously, but has its own realm.
fn mount_frame(html: &str) -> web_sys::Document {
    let doc = document();
    let iframe: web_sys::HtmlIFrameElement = doc.create_element("iframe").expect("create").unchecked_into();
    doc.body().expect("body").append_child(&iframe).expect("append");
    let inner = iframe.content_document().expect("same-origin frame");
    inner.body().expect("frame body").set_inner_html(html);
    inner
}

fn rules_json(url: &str, selector: &str, content: &str, mode: &str) -> JsValue {
    let text = format!(
        r#"{{"rules":[{{"id":"1","url":"{}","selector":"{}","newContent":"{}","modifyMode":"{}","enableColor":true,"textColor":"rgb(255, 0, 0)"}}],"forceLoopEnabled":false}}"#,
        url, selector, content, mode
    );
    js_sys::JSON::parse(&text).expect("json")
}

#[wasm_bindgen_test]
fn query_selector_reports_invalid_selectors() {
    let doc = BrowserDocument(document());
    assert!(doc.has_body());
    assert!(doc.query_selector("div[").is_err());
    assert!(doc.query_selector("#does-not-exist").expect("valid").is_none());
}

#[wasm_bindgen_test]
fn element_handle_reads_and_writes() {
    mount("handle-target", "<span>old</span>");
    let doc = BrowserDocument(document());
    let el = doc.query_selector("#handle-target").expect("valid").expect("present");

    el.set_inner_html("<b>new</b>");
    assert_eq!(el.inner_html(), "<b>new</b>");
    assert_eq!(el.text_content(), "new");
    el.set_text_color("rgb(0, 0, 255)").expect("style");
    assert_eq!(el.text_color(), "rgb(0, 0, 255)");
    assert_eq!(el.parent().map(|p| p.tag_name()), Some("BODY".to_string()));
}

#[wasm_bindgen_test]
fn content_script_applies_once_rule() {
    let target = mount("once-target", "before");
    let url = web_sys::window().expect("window").location().href().expect("href");

    let script = ContentScript::new().expect("script");
    let applied = script.load(rules_json(&url, "#once-target", "after", "once")).expect("load");

    assert_eq!(applied, 1);
    assert_eq!(target.inner_html(), "after");
    assert_eq!(script.state(), "idle");
    script.shutdown();
}

#[wasm_bindgen_test]
fn content_script_observes_loop_rule() {
    mount("loop-target", "before");
    let url = web_sys::window().expect("window").location().href().expect("href");

    let script = ContentScript::new().expect("script");
    script.load(rules_json(&url, "#loop-target", "after", "loop")).expect("load");
    assert_eq!(script.state(), "observing");

    let message = js_sys::JSON::parse(r#"{"type":"UPDATE_FORCE_LOOP","enabled":true}"#).expect("json");
    script.handle_message(message).expect("message");
    assert_eq!(script.state(), "observing+forcing");

    script.shutdown();
    assert_eq!(script.state(), "idle");
}

#[wasm_bindgen_test]
fn export_then_import_merges() {
    let rules = js_sys::JSON::parse(r##"[{"id":"7","url":"https://a.example/","selector":"#x","newContent":"y"}]"##)
        .expect("json");
    let payload = export_rules(rules, JsValue::UNDEFINED).expect("export");

    let result = import_rules("modifier-rules-2024-01-01.mrf", &payload, "https://b.example/", JsValue::NULL)
        .expect("import");
    let appended = js_sys::Reflect::get(&result, &"appended".into()).expect("field");
    assert_eq!(appended.as_f64(), Some(1.0));

    assert!(import_rules("rules.json", &payload, "https://b.example/", JsValue::NULL).is_err());
}

#[wasm_bindgen_test]
fn content_script_writes_color_inside_frame() {
    let inner = mount_frame("<h1 id=\"framed-title\">before</h1>");
    let url = web_sys::window().expect("window").location().href().expect("href");

    let script = ContentScript::new().expect("script");
    let applied = script.load(rules_json(&url, "#framed-title", "after", "once")).expect("load");
    assert_eq!(applied, 1);

    let target = inner.get_element_by_id("framed-title").expect("still present");
    assert_eq!(target.inner_html(), "after");
    let style = js_sys::Reflect::get(&target, &"style".into()).expect("style");
    let color = js_sys::Reflect::get(&style, &"color".into()).expect("color");
    assert_eq!(color.as_string().as_deref(), Some("rgb(255, 0, 0)"));

    let handle = BrowserDocument(inner).query_selector("#framed-title").expect("valid").expect("present");
    assert_eq!(handle.text_color(), "rgb(255, 0, 0)");
    script.shutdown();
}
