use super::super::*;
use crate::cycle::{resolve_path, REF_KEY};
use proptest::prelude::*;
use serde_json::json;

fn json_tree() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i32>().prop_map(serde_json::Value::from),
        (-1.0e6..1.0e6f64).prop_map(serde_json::Value::from),
        "[a-z \\n\"<>&]{0,8}".prop_map(serde_json::Value::from),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(serde_json::Value::Array),
            prop::collection::vec(("[a-z$\"\\\\\\]\\[]{1,5}", inner), 0..6)
                .prop_map(|entries| serde_json::Value::Object(entries.into_iter().collect())),
        ]
    })
}

/// Trees built directly as values, so they can hold NaN and undefined
fn value_tree() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Number(f64::NAN)),
        Just(Value::Undefined),
        any::<f64>().prop_map(Value::Number),
        "[a-z]{0,4}".prop_map(Value::from),
    ];
    leaf.prop_recursive(4, 32, 5, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(|items| Value::array(items)),
            prop::collection::vec(("[a-z]{1,3}", inner), 0..5)
                .prop_map(|entries| Value::object(entries)),
        ]
    })
}

proptest! {
    #[test]
    fn test_acyclic_round_trip(json in json_tree()) {
        let value = Value::from(json);
        let rebuilt = retrocycle(decycle(&value));

        prop_assert!(rebuilt.deep_eq(&value));
        prop_assert_eq!(stringify(&rebuilt), stringify(&value));
    }

    #[test]
    fn test_acyclic_tree_has_no_markers(json in json_tree()) {
        let value = Value::from(json);
        let text = stringify(&decycle(&value)).unwrap_or_default();

        prop_assert_eq!(Some(text), stringify(&value));
        let has_marker = stringify(&value).unwrap_or_default().contains(r#"{"$ref":"#);
        prop_assert!(!has_marker, "acyclic tree contains a marker");
    }

    #[test]
    fn test_round_trip_with_nan_and_undefined(value in value_tree()) {
        let rebuilt = retrocycle(decycle(&value));
        prop_assert!(rebuilt.deep_eq(&value));
    }
}

/// Test NaN survives the round trip and still compares equal
#[test]
fn test_nan_round_trip() {
    let value = Value::array([
        Value::Number(f64::NAN),
        Value::object([("n", Value::Number(f64::NAN))]),
    ]);

    assert!(value.deep_eq(&value));
    assert!(retrocycle(decycle(&value)).deep_eq(&value));
    assert!(!Value::Number(f64::NAN).deep_eq(&Value::Number(1.0)));
}

/// Test a node shared by two parents keeps its identity through the round trip
#[test]
fn test_shared_node_identity() {
    let shared = Value::from(json!({"k": "v"}));
    let root = Value::array([shared.clone(), Value::object([("again", shared.clone())])]);

    let rebuilt = retrocycle(decycle(&root));
    let first = rebuilt.index(0).unwrap();
    let second = rebuilt.index(1).and_then(|o| o.get("again")).unwrap();

    assert!(first.same_node(&second));
    assert!(!first.same_node(&shared));
}

/// Test mutually referencing objects
#[test]
fn test_mutual_cycle() {
    let a = Value::object([("name", Value::from("a"))]);
    let b = Value::object([("name", Value::from("b")), ("peer", a.clone())]);
    a.set("peer", b.clone());

    assert_eq!(
        stringify(&a).as_deref(),
        Some(r#"{"name":"a","peer":{"name":"b","peer":{"$ref":"$"}}}"#)
    );

    let rebuilt = retrocycle(decycle(&a));
    let peer_of_peer = rebuilt.get("peer").and_then(|p| p.get("peer")).unwrap();
    assert!(peer_of_peer.same_node(&rebuilt));
}

/// Test markers deep in the tree with quoted keys
#[test]
fn test_deep_marker_with_quoted_key() {
    let inner = Value::array([Value::from(1)]);
    let root = Value::object([
        ("weird \"key\"", Value::object([("list", inner.clone())])),
        ("alias", inner.clone()),
    ]);

    let tree = decycle(&root);
    let marker = tree.get("alias").and_then(|m| m.get(REF_KEY)).unwrap();
    assert_eq!(marker, Value::from(r#"$["weird \"key\""]["list"]"#));

    let path = marker.as_str().unwrap().to_string();
    let list = tree.get("weird \"key\"").and_then(|o| o.get("list")).unwrap();
    assert!(resolve_path(&tree, &path).unwrap().same_node(&list));

    let rebuilt = retrocycle(tree);
    assert!(rebuilt.get("alias").unwrap().same_node(
        &rebuilt.get("weird \"key\"").and_then(|o| o.get("list")).unwrap()
    ));
}

/// Test a long self-referencing chain terminates
#[test]
fn test_long_chain_with_back_edge() {
    let head = Value::empty_object();
    let mut tail = head.clone();
    for i in 0..50 {
        let next = Value::object([("i", Value::from(i))]);
        tail.set("next", next.clone());
        tail = next;
    }
    tail.set("next", head.clone());

    let text = stringify(&head).unwrap();
    assert!(text.contains(r#""i":49,"next":{"$ref":"$"}"#));

    let rebuilt = retrocycle(decycle(&head));
    let mut cursor = rebuilt.clone();
    for _ in 0..51 {
        cursor = cursor.get("next").unwrap();
    }
    assert!(cursor.same_node(&rebuilt));
}

/// Test a structured argument carrying a cycle is stored and pretty printed
#[test]
fn test_cyclic_payload_through_logger() {
    let logger = Logger::builder().console(ConsoleFns::none()).build();
    let payload = Value::object([("id", Value::from(9))]);
    payload.set("self", payload.clone());

    let record = logger.info(args!["graph", "cyclic payload", payload]).unwrap();
    let stored = logger.get_logs("graph").unwrap();

    assert_eq!(record.data.len(), 1);
    assert_eq!(stored[0].extra[0].kind, ExtraKind::Code);
    assert!(stored[0].extra[0]
        .data
        .contains("<span class=json-key>id</span>: <span class=json-value>9</span>"));
    assert!(stored[0].extra[0].data.contains(r#""$ref": "$""#));
}
