//! Ordered/filtered reads over the children of a tree node.

use serde_json::Value;
use std::cmp::Ordering;

#[derive(Clone, Debug, Default, PartialEq)]
pub enum OrderBy {
    #[default]
    Key,
    Child(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Limit {
    First(usize),
    Last(usize),
}

/// A child query, mirroring the realtime-database query builder:
/// one ordering, optional range/equality bounds and an optional limit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    order_by: OrderBy,
    start_at: Option<Value>,
    end_at: Option<Value>,
    limit: Option<Limit>,
}

impl Query {
    pub fn new() -> Self { Self::default() }

    pub fn order_by_key() -> Self { Self { order_by: OrderBy::Key, ..Self::default() } }

    pub fn order_by_child(child: impl Into<String>) -> Self {
        Self { order_by: OrderBy::Child(child.into()), ..Self::default() }
    }

    pub fn equal_to(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.start_at = Some(value.clone());
        self.end_at = Some(value);
        self
    }

    pub fn start_at(mut self, value: impl Into<Value>) -> Self { self.start_at = Some(value.into()); self }
    pub fn end_at(mut self, value: impl Into<Value>) -> Self { self.end_at = Some(value.into()); self }
    pub fn limit_to_first(mut self, n: usize) -> Self { self.limit = Some(Limit::First(n)); self }
    pub fn limit_to_last(mut self, n: usize) -> Self { self.limit = Some(Limit::Last(n)); self }

    pub fn order_by(&self) -> &OrderBy { &self.order_by }

    /// Child-equality value when `start_at == end_at`, used by stores that can push the filter down.
    pub fn equality(&self) -> Option<(&str, &Value)> {
        match (&self.order_by, &self.start_at, &self.end_at) {
            (OrderBy::Child(child), Some(a), Some(b)) if a == b => Some((child.as_str(), a)),
            _ => None,
        }
    }

    /// Sort, filter and limit `(key, value)` children.
    pub fn apply(&self, mut children: Vec<(String, Value)>) -> Vec<(String, Value)> {
        children.sort_by(|(ka, va), (kb, vb)| {
            let ord = match &self.order_by {
                OrderBy::Key => Ordering::Equal,
                OrderBy::Child(child) => compare_values(child_value(va, child), child_value(vb, child)),
            };
            ord.then_with(|| ka.cmp(kb))
        });

        children.retain(|(key, value)| {
            let probe = match &self.order_by {
                OrderBy::Key => Some(Value::String(key.clone())),
                OrderBy::Child(child) => child_value(value, child).cloned(),
            };
            let probe = probe.as_ref();
            let after_start = self.start_at.as_ref().map_or(true, |s| compare_values(probe, Some(s)) != Ordering::Less);
            let before_end = self.end_at.as_ref().map_or(true, |e| compare_values(probe, Some(e)) != Ordering::Greater);
            after_start && before_end
        });

        match self.limit {
            Some(Limit::First(n)) => children.truncate(n),
            Some(Limit::Last(n)) => {
                let skip = children.len().saturating_sub(n);
                children.drain(..skip);
            }
            None => {}
        }
        children
    }
}

fn child_value<'a>(value: &'a Value, child: &str) -> Option<&'a Value> {
    child.split('/').try_fold(value, |node, seg| node.get(seg))
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(false)) => 1,
        Some(Value::Bool(true)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_) | Value::Object(_)) => 5,
    }
}

/// Realtime-database ordering: null < false < true < numbers < strings < objects.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn children() -> Vec<(String, Value)> {
        vec![
            ("c".into(), json!({"stock": 12, "code": "SAVE10"})),
            ("a".into(), json!({"stock": 3, "code": "WELCOME"})),
            ("b".into(), json!({"stock": 7})),
            ("d".into(), json!({"stock": 0, "code": "SAVE10"})),
        ]
    }

    #[test]
    fn test_equal_to_filters_by_child() {
        let hits = Query::order_by_child("code").equal_to("SAVE10").apply(children());
        let keys: Vec<_> = hits.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["c", "d"]);
    }

    #[test]
    fn test_range_and_limit() {
        let low = Query::order_by_child("stock").start_at(1).end_at(10).apply(children());
        let keys: Vec<_> = low.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);

        let last = Query::order_by_child("stock").limit_to_last(2).apply(children());
        let keys: Vec<_> = last.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_missing_children_sort_first() {
        let sorted = Query::order_by_child("code").apply(children());
        assert_eq!(sorted[0].0, "b");
    }

    #[test]
    fn test_type_ordering() {
        assert_eq!(compare_values(Some(&json!(true)), Some(&json!(1))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(99)), Some(&json!("1"))), Ordering::Less);
        assert_eq!(compare_values(None, Some(&json!(false))), Ordering::Less);
    }
}
