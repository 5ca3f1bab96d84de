use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct Health {
    pub status: &'static str,
}

/// Plain acknowledgement body, e.g. `{"msg": "Product deleted"}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub msg: String,
}

impl Message {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// Collection envelope returned by list endpoints.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Listing<T> {
    pub total: usize,
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for Listing<T> {
    fn from(items: Vec<T>) -> Self {
        Self { total: items.len(), items }
    }
}
