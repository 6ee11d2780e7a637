use indexmap::IndexMap;
use serde::{Serialize, de::Error as _};

/// Caller-supplied facts used to gate conditional rules.
///
/// Each key holds one or more values; a condition holds when any of them
/// satisfies it. In JSON a key maps to a string, a list of strings, or a
/// number/boolean (stringified); `null` entries are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Context {
    values: IndexMap<String, Vec<String>>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    /// Builder form of [`Context::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.values.get(key).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Decodes a JSON object of context values. `null` means no facts.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        match value {
            serde_json::Value::Null => Ok(Context::new()),
            serde_json::Value::Object(obj) => {
                let mut context = Context::new();
                for (key, value) in obj {
                    if let Some(values) = json_values(value)? {
                        context.values.insert(key, values);
                    }
                }
                Ok(context)
            }
            _ => Err(serde_json::Error::custom(
                "context must be a JSON object of values",
            )),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = Context::new();
        for (key, value) in iter {
            context.insert(key, value);
        }
        context
    }
}

fn scalar(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Values of one context entry; `None` for `null`.
fn json_values(value: serde_json::Value) -> Result<Option<Vec<String>>, serde_json::Error> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| {
                scalar(item).ok_or_else(|| {
                    serde_json::Error::custom("context lists may only hold scalars")
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        serde_json::Value::Object(_) => Err(serde_json::Error::custom(
            "context values must be scalars or lists",
        )),
        value => Ok(scalar(value).map(|v| vec![v])),
    }
}
