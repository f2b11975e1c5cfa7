//! Shared helpers for the integration suites: a small JSON value tree, a
//! serializer for it, and a walker that checks a parsed tape against it.

use tapejson::TapeIterator;

/// A JSON value tree used to generate test documents and to check parses
/// against. Object member order is significant, and duplicate keys are
/// allowed, mirroring what the tape preserves.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
}

/// Serialize a value tree to JSON text.
pub fn to_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Int(v) => out.push_str(&v.to_string()),
        Value::Double(v) => {
            // Keep a fraction marker so the document reparses as a double
            // rather than an integer.
            if v.fract() == 0.0 {
                out.push_str(&format!("{v:.1}"));
            } else {
                out.push_str(&v.to_string());
            }
        }
        Value::Str(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(members) => {
            out.push('{');
            for (i, (key, value)) in members.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(value, out);
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Walk the iterator, asserting that the parsed document matches `expected`
/// node for node (values, key order, and container shapes). Leaves the
/// cursor on the checked node.
pub fn check_value(iter: &mut TapeIterator<'_>, expected: &Value) {
    match expected {
        Value::Null => assert!(iter.is_null(), "expected null"),
        Value::Bool(true) => assert!(iter.is_true(), "expected true"),
        Value::Bool(false) => assert!(iter.is_false(), "expected false"),
        Value::Int(v) => assert_eq!(iter.get_integer(), Some(*v)),
        Value::Double(v) => {
            let got = iter.get_double().expect("expected a double");
            assert_eq!(got.to_bits(), v.to_bits(), "double mismatch: {got} vs {v}");
        }
        Value::Str(s) => assert_eq!(iter.get_string(), Some(s.as_str())),
        Value::Array(items) => {
            assert!(iter.is_array(), "expected an array");
            if items.is_empty() {
                assert!(!iter.down(), "down() into an empty array");
            } else {
                assert!(iter.down());
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        assert!(iter.next(), "array ended early at element {i}");
                    }
                    check_value(iter, item);
                }
                assert!(!iter.next(), "array has extra elements");
                assert!(iter.up());
            }
        }
        Value::Object(members) => {
            assert!(iter.is_object(), "expected an object");
            if members.is_empty() {
                assert!(!iter.down(), "down() into an empty object");
            } else {
                assert!(iter.down());
                for (i, (key, value)) in members.iter().enumerate() {
                    if i > 0 {
                        assert!(iter.next(), "object ended early at member {i}");
                    }
                    assert_eq!(iter.get_string(), Some(key.as_str()), "key mismatch");
                    assert!(iter.next(), "key {key:?} has no value");
                    check_value(iter, value);
                }
                assert!(!iter.next(), "object has extra members");
                assert!(iter.up());
            }
        }
    }
}
