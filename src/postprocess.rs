use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

/// Caller-supplied leaf coercion.
pub type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// One postprocessing rule: a key-name pattern and the transform to
/// apply to the leaf values under matching keys.
#[derive(Clone)]
pub struct PostprocessRule {
    pattern: Regex,
    transform: Transform,
}

impl PostprocessRule {
    pub fn new(
        pattern: Regex,
        transform: impl Fn(Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            pattern,
            transform: Arc::new(transform),
        }
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }
}

impl fmt::Debug for PostprocessRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostprocessRule")
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

/// Rewrite leaf values of a decoded document according to the rules.
///
/// Every map key re-selects the transform for its subtree: the first
/// rule whose pattern matches the key wins, and the selection replaces
/// whatever transform arrived from above, including replacing it with
/// nothing when no rule matches. Sequences carry the inherited
/// transform through to their elements unchanged, since they have no
/// keys to match against. Scalars apply the transform in effect.
pub fn postprocess(rules: &[PostprocessRule], value: Value) -> Value {
    if rules.is_empty() {
        return value;
    }
    walk(rules, value, None)
}

fn walk(rules: &[PostprocessRule], value: Value, active: Option<&Transform>) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, child)| {
                    let selected = rules
                        .iter()
                        .find(|rule| rule.pattern.is_match(&key))
                        .map(|rule| &rule.transform);
                    let child = walk(rules, child, selected);
                    (key, child)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| walk(rules, item, active))
                .collect(),
        ),
        leaf => match active {
            Some(transform) => transform(leaf),
            None => leaf,
        },
    }
}
