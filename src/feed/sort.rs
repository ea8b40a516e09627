use std::cmp::Ordering;

use serde_json::Value;
use tracing::warn;

/// Orders items by the `key` field of their raw record, ascending unless
/// `desc`.
///
/// All values must be strings or all numbers; otherwise the items are
/// ordered by id (numerically when every id is numeric).
pub fn sort_records<T, R>(mut items: Vec<T>, record: R, key: &str, desc: bool) -> Vec<T>
where
    R: Fn(&T) -> &Value,
{
    match sort_kind(items.iter().map(&record), key) {
        Some(Kind::Text) => items.sort_by(|a, b| text(record(a), key).cmp(text(record(b), key))),
        Some(Kind::Number) => items.sort_by(|a, b| {
            number(record(a), key)
                .partial_cmp(&number(record(b), key))
                .unwrap_or(Ordering::Equal)
        }),
        None => {
            warn!("Cannot sort videos by '{}', falling back to id", key);
            sort_by_id(&mut items, &record);
        }
    }

    if desc {
        items.reverse();
    }
    items
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Text,
    Number,
}

fn sort_kind<'a>(records: impl Iterator<Item = &'a Value>, key: &str) -> Option<Kind> {
    let mut kind = None;
    for record in records {
        let this = match record.get(key)? {
            Value::String(_) => Kind::Text,
            Value::Number(_) => Kind::Number,
            _ => return None,
        };
        if kind.is_some_and(|k| k != this) {
            return None;
        }
        kind = Some(this);
    }
    // An empty list sorts trivially.
    Some(kind.unwrap_or(Kind::Text))
}

fn text<'a>(record: &'a Value, key: &str) -> &'a str {
    record.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn number(record: &Value, key: &str) -> f64 {
    record.get(key).and_then(Value::as_f64).unwrap_or_default()
}

fn sort_by_id<T, R>(items: &mut [T], record: &R)
where
    R: Fn(&T) -> &Value,
{
    let numeric = items
        .iter()
        .all(|item| text(record(item), "id").parse::<u64>().is_ok());

    if numeric {
        items.sort_by_key(|item| text(record(item), "id").parse::<u64>().unwrap_or(0));
    } else {
        items.sort_by(|a, b| text(record(a), "id").cmp(text(record(b), "id")));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ids(records: &[Value], key: &str, desc: bool) -> Vec<String> {
        sort_records(records.iter().collect::<Vec<_>>(), |r| *r, key, desc)
            .iter()
            .map(|r| text(r, "id").to_string())
            .collect()
    }

    #[test]
    fn sorts_by_timestamp_field() {
        let records = vec![
            json!({"id": "1", "published_at": "2023-03-01T00:00:00Z"}),
            json!({"id": "2", "published_at": "2023-01-01T00:00:00Z"}),
            json!({"id": "3", "published_at": "2023-02-01T00:00:00Z"}),
        ];
        assert_eq!(ids(&records, "published_at", false), ["2", "3", "1"]);
        assert_eq!(ids(&records, "published_at", true), ["1", "3", "2"]);
    }

    #[test]
    fn sorts_numbers_numerically() {
        let records = vec![
            json!({"id": "a", "view_count": 100}),
            json!({"id": "b", "view_count": 9}),
        ];
        assert_eq!(ids(&records, "view_count", false), ["b", "a"]);
    }

    #[test]
    fn missing_or_mixed_field_falls_back_to_numeric_id() {
        let records = vec![
            json!({"id": "100", "title": "x"}),
            json!({"id": "20"}),
            json!({"id": "3", "title": 5}),
        ];
        assert_eq!(ids(&records, "title", false), ["3", "20", "100"]);
        assert_eq!(ids(&records, "nope", true), ["100", "20", "3"]);
    }
}
