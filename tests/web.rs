//! Browser smoke tests for the JS facade. Run with `wasm-pack test --headless --chrome`.

#![cfg(target_arch = "wasm32")]

use mentionlens::{HostMutation, MentionLens};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

const PAGE: &str = r#"<html><head><meta name="user-login" content="alice"></head><body>
    <h1 class="gh-header-title">Title</h1>
    <div class="comment-body"><p>ping @alice and @Alice</p></div>
    </body></html>"#;

#[wasm_bindgen_test]
fn lens_counts_and_navigates() {
    let mut lens = MentionLens::js_new(None).unwrap();
    lens.js_load_html(PAGE, "https://github.com/o/r/pull/3");
    assert_eq!(lens.js_next(), 0);
    assert_eq!(lens.js_next(), 1);
    assert_eq!(lens.js_goto(7), 0);
    assert!(lens.js_html().contains("mention-lens-counter"));
    assert!(!lens.js_diagnostics().is_null());
}

#[wasm_bindgen_test]
fn lens_rejects_bad_config() {
    assert!(MentionLens::js_new(Some("[]".to_string())).is_err());
}

#[wasm_bindgen_test]
fn lens_exchanges_patches_and_mutations() {
    let mut lens = MentionLens::js_new(None).unwrap();
    lens.js_set_mirroring(true);
    lens.js_load_html(PAGE, "https://github.com/o/r/pull/3");
    let patches = js_sys::Array::from(&lens.js_take_patches());
    assert!(patches.length() > 0);

    // <html> is child 0 of the document, <body> child 1 of <html>.
    let records = vec![HostMutation::Insert {
        parent: vec![0, 1],
        index: 99,
        html: r#"<div class="comment-body">late @alice</div>"#.to_string(),
    }];
    let records = serde_wasm_bindgen::to_value(&records).unwrap();
    assert_eq!(lens.js_apply_mutations(records, None, 1.0).unwrap(), 1);
    assert!(lens.js_apply_mutations(wasm_bindgen::JsValue::from_str("nope"), None, 2.0).is_err());
}
