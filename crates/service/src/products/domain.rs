use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ServiceError;
use crate::storage::Record;

/// Attributes every product must carry on creation.
pub const REQUIRED_FIELDS: [&str; 4] = ["name", "price", "quantity", "image"];

/// Stored product: the id plus whatever attributes the caller sent.
///
/// Attributes are kept as raw JSON so a record with an unexpected type or an
/// extra key never stops the rest of the file from loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Product {
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

impl Record for Product {
    const KIND: &'static str = "product";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Caller-supplied product attributes, stored as sent.
///
/// A full-replace update drops every attribute the body leaves out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductInput(pub Map<String, Value>);

impl ProductInput {
    /// Required-field check applied on creation: each of
    /// [`REQUIRED_FIELDS`] present and truthy.
    pub fn validate(&self) -> Result<(), ServiceError> {
        match REQUIRED_FIELDS.iter().find(|k| !self.0.get(**k).is_some_and(is_truthy)) {
            Some(missing) => Err(ServiceError::Validation(format!("{missing} is required"))),
            None => Ok(()),
        }
    }

    pub(crate) fn into_product(mut self, id: String) -> Product {
        // the stored id always comes from the store
        self.0.remove("id");
        Product { id, attributes: self.0 }
    }
}

impl<const N: usize> From<[(&str, Value); N]> for ProductInput {
    fn from(pairs: [(&str, Value); N]) -> Self {
        Self(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pen() -> ProductInput {
        ProductInput::from([
            ("name", json!("Pen")),
            ("price", json!(1)),
            ("quantity", json!(100)),
            ("image", json!("pen.png")),
        ])
    }

    fn without(key: &str) -> ProductInput {
        let mut input = pen();
        input.0.remove(key);
        input
    }

    fn with(key: &str, value: Value) -> ProductInput {
        let mut input = pen();
        input.0.insert(key.to_string(), value);
        input
    }

    #[test]
    fn validate_requires_truthy_fields() {
        assert!(pen().validate().is_ok());
        for key in REQUIRED_FIELDS {
            assert!(without(key).validate().is_err(), "{key}");
        }
        assert!(with("name", json!("")).validate().is_err());
        assert!(with("price", json!(0)).validate().is_err());
        assert!(with("quantity", Value::Null).validate().is_err());
        assert!(with("image", json!(false)).validate().is_err());
        // any non-empty value passes, typed or not
        assert!(with("price", json!("2")).validate().is_ok());
        assert!(with("quantity", json!(-3)).validate().is_ok());
    }

    #[test]
    fn extra_attributes_are_kept_and_id_is_overridden() {
        let input: ProductInput =
            serde_json::from_str(r#"{"id":"forged","name":"Pencil","price":"2","colour":"red"}"#).unwrap();
        let product = input.into_product("real".into());
        assert_eq!(product.id, "real");
        assert_eq!(product.attr("price"), Some(&json!("2")));
        assert_eq!(product.attr("colour"), Some(&json!("red")));

        let raw = serde_json::to_value(&product).unwrap();
        assert_eq!(raw, json!({"id": "real", "name": "Pencil", "price": "2", "colour": "red"}));
    }
}
