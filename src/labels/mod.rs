use get_size::GetSize;
use std::fmt::Display;
use valkey_module::ValkeyValue;

mod matchers;

pub use matchers::*;

/// A label/value pair attached to a series. Pairs keep the order the user
/// supplied them in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, GetSize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new<S: Into<String>, T: Into<String>>(name: S, value: T) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

impl From<&Label> for ValkeyValue {
    fn from(label: &Label) -> Self {
        ValkeyValue::Array(vec![
            ValkeyValue::from(label.name.as_str()),
            ValkeyValue::from(label.value.as_str()),
        ])
    }
}
