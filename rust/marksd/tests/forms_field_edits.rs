mod common;

use common::{error_code, open_form, Sidecar};
use serde_json::json;

#[test]
fn drawing_external_over_cap_keeps_previous_value() {
    let mut sc = Sidecar::spawn();
    let form_id = open_form(&mut sc, json!([{ "id": 1, "name": "Drawing" }]));

    let first = sc.request_ok(
        "1",
        "forms.setField",
        json!({ "formId": form_id, "index": 0, "field": "external_marks", "value": "42" }),
    );
    assert_eq!(first["accepted"], true);
    assert_eq!(first["value"].as_f64(), Some(42.0));

    let over = sc.request_ok(
        "2",
        "forms.setField",
        json!({ "formId": form_id, "index": 0, "field": "external_marks", "value": "55" }),
    );
    assert_eq!(over["accepted"], false);
    assert_eq!(over["outcome"], "rejected");
    let message = over["message"].as_str().expect("message");
    assert!(message.contains("50"), "{message}");
    assert_eq!(over["value"].as_f64(), Some(42.0));
    assert_eq!(
        over["form"]["errors"]["0_external_marks"].as_str(),
        Some(message)
    );

    sc.close();
}

#[test]
fn drawing_internal_is_always_rejected() {
    let mut sc = Sidecar::spawn();
    let form_id = open_form(
        &mut sc,
        json!({ "subjects": [{ "subject_name": "Technical Drawing" }] }),
    );

    for (i, value) in [json!("5"), json!(0), json!("")].into_iter().enumerate() {
        let res = sc.request_ok(
            &format!("d{i}"),
            "forms.setField",
            json!({ "formId": form_id, "index": 0, "field": "internal_marks", "value": value }),
        );
        assert_eq!(res["outcome"], "rejected");
        assert_eq!(res["message"], "internal marks not allowed for this subject");
        assert!(res["value"].is_null());
    }

    sc.close();
}

#[test]
fn empty_value_clears_error_and_stored_value() {
    let mut sc = Sidecar::spawn();
    let form_id = open_form(&mut sc, json!([{ "name": "Hindi" }]));

    let _ = sc.request_ok(
        "1",
        "forms.setField",
        json!({ "formId": form_id, "index": 0, "field": "internal_marks", "value": 15 }),
    );
    let bad = sc.request_ok(
        "2",
        "forms.setField",
        json!({ "formId": form_id, "index": 0, "field": "internal_marks", "value": "21" }),
    );
    assert_eq!(bad["message"], "internal marks must not exceed 20");

    let cleared = sc.request_ok(
        "3",
        "forms.setField",
        json!({ "formId": form_id, "index": 0, "field": "internal_marks", "value": "" }),
    );
    assert_eq!(cleared["outcome"], "cleared");
    assert!(cleared["value"].is_null());
    assert_eq!(cleared["form"]["errors"], json!({}));

    sc.close();
}

#[test]
fn non_numeric_and_negative_input() {
    let mut sc = Sidecar::spawn();
    let form_id = open_form(&mut sc, json!([{ "name": "Hindi" }]));

    let ignored = sc.request_ok(
        "1",
        "forms.setField",
        json!({ "formId": form_id, "index": 0, "field": "external_marks", "value": "abc" }),
    );
    assert_eq!(ignored["outcome"], "ignored");
    assert_eq!(ignored["form"]["errors"], json!({}));

    let negative = sc.request_ok(
        "2",
        "forms.setField",
        json!({ "formId": form_id, "index": 0, "field": "external_marks", "value": "-3" }),
    );
    assert_eq!(negative["message"], "minimum marks must be 0");
    assert!(negative["value"].is_null());

    sc.close();
}

#[test]
fn bad_params_are_reported() {
    let mut sc = Sidecar::spawn();
    let form_id = open_form(&mut sc, json!([{ "name": "Hindi" }]));

    let e = sc.request_err(
        "1",
        "forms.setField",
        json!({ "formId": form_id, "index": 4, "field": "external_marks", "value": "1" }),
    );
    assert_eq!(error_code(&e), "bad_params");
    assert_eq!(e["details"]["index"], 4);

    let e = sc.request_err(
        "2",
        "forms.setField",
        json!({ "formId": form_id, "index": 0, "field": "practical_marks", "value": "1" }),
    );
    assert_eq!(error_code(&e), "bad_params");

    let e = sc.request_err(
        "3",
        "forms.setField",
        json!({ "formId": "missing", "index": 0, "field": "external_marks", "value": "1" }),
    );
    assert_eq!(error_code(&e), "not_found");

    let e = sc.request_err("4", "forms.open", json!({ "subjects": { "data": 1 } }));
    assert_eq!(error_code(&e), "backend_contract");

    sc.close();
}
