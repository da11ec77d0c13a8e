//! S-expression plist helpers over `lexpr` values.
//!
//! Config files, landmark traces and emitted events all use keyword
//! plists.  Keys may parse as `Value::Keyword("key")` (elisp syntax) or
//! `Value::Symbol(":key")` (default syntax); both are accepted.

use lexpr::Value;

/// Raw value following `:key` in a plist.
pub fn plist_get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let prefixed = format!(":{}", key);
    let mut current = value;
    while let Value::Cons(pair) = current {
        let is_key = match pair.car() {
            Value::Keyword(k) => k.as_ref() == key,
            Value::Symbol(s) => s.as_ref() == prefixed,
            _ => false,
        };
        if is_key {
            return match pair.cdr() {
                Value::Cons(next) => Some(next.car()),
                _ => None,
            };
        }
        current = pair.cdr();
    }
    None
}

/// Value following `:key`, rendered as a string.
///
/// Keywords lose their leading colon; booleans and the empty list render
/// as `t` / `nil`.
pub fn get_keyword(value: &Value, key: &str) -> Option<String> {
    let val = plist_get(value, key)?;
    Some(match val {
        Value::Keyword(v) => v.to_string(),
        Value::Symbol(v) => {
            let s = v.to_string();
            s.strip_prefix(':').unwrap_or(&s).to_string()
        }
        Value::String(v) => v.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "t" } else { "nil" }.to_string(),
        Value::Null | Value::Nil => "nil".to_string(),
        _ => val.to_string(),
    })
}

pub fn get_float(value: &Value, key: &str) -> Option<f64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Treats anything but `nil` as true.
pub fn get_bool(value: &Value, key: &str) -> Option<bool> {
    get_keyword(value, key).map(|s| s != "nil")
}

/// Top-level elements of a proper or dotted list.
pub fn list_items(value: &Value) -> Vec<&Value> {
    let mut items = Vec::new();
    let mut current = value;
    loop {
        match current {
            Value::Cons(pair) => {
                items.push(pair.car());
                current = pair.cdr();
            }
            Value::Null | Value::Nil => break,
            other => {
                items.push(other);
                break;
            }
        }
    }
    items
}

/// Numeric elements of a flat list.  `None` if any element is not a number.
pub fn number_list(value: &Value) -> Option<Vec<f64>> {
    list_items(value)
        .into_iter()
        .map(|v| match v {
            Value::Number(n) => n.as_f64(),
            _ => None,
        })
        .collect()
}

pub fn bool_sexp(b: bool) -> &'static str {
    if b {
        "t"
    } else {
        "nil"
    }
}

/// Format an event s-expression.
pub fn format_event(event_type: &str, fields: &[(&str, &str)]) -> String {
    let mut s = format!("(:type :event :event :{}", event_type);
    for (key, val) in fields {
        s.push_str(&format!(" :{} {}", key, val));
    }
    s.push(')');
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_keyword_from_plist() {
        let v = lexpr::from_str("(:mode :mouse :cooldown-frames 30)").unwrap();
        assert_eq!(get_keyword(&v, "mode"), Some("mouse".to_string()));
        assert_eq!(get_float(&v, "cooldown-frames"), Some(30.0));
    }

    #[test]
    fn test_get_keyword_missing_key() {
        let v = lexpr::from_str("(:mode :mouse)").unwrap();
        assert_eq!(get_keyword(&v, "nonexistent"), None);
    }

    #[test]
    fn test_get_keyword_empty_list() {
        let v = lexpr::from_str("()").unwrap();
        assert_eq!(get_keyword(&v, "mode"), None);
    }

    #[test]
    fn test_key_without_value() {
        let v = lexpr::from_str("(:mode)").unwrap();
        assert_eq!(get_keyword(&v, "mode"), None);
    }

    #[test]
    fn test_get_float() {
        let v = lexpr::from_str("(:alpha 0.25 :n 3)").unwrap();
        assert_eq!(get_float(&v, "alpha"), Some(0.25));
        assert_eq!(get_float(&v, "n"), Some(3.0));
    }

    #[test]
    fn test_get_bool() {
        let v = lexpr::from_str("(:a t :b nil)").unwrap();
        assert_eq!(get_bool(&v, "a"), Some(true));
        assert_eq!(get_bool(&v, "b"), Some(false));
    }

    #[test]
    fn test_number_list() {
        let v = lexpr::from_str("(:p (1 2.5 -3))").unwrap();
        let p = plist_get(&v, "p").unwrap();
        assert_eq!(number_list(p), Some(vec![1.0, 2.5, -3.0]));
    }

    #[test]
    fn test_number_list_rejects_symbols() {
        let v = lexpr::from_str("(1 two 3)").unwrap();
        assert_eq!(number_list(&v), None);
    }

    #[test]
    fn test_list_items_nested() {
        let v = lexpr::from_str("((1 2) (3 4) (5 6))").unwrap();
        assert_eq!(list_items(&v).len(), 3);
    }

    #[test]
    fn test_format_event() {
        let e = format_event("scroll", &[("delta", "-3")]);
        assert_eq!(e, "(:type :event :event :scroll :delta -3)");
    }
}
