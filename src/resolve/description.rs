//! # Rendered Descriptions

use std::fmt;

/// A human-readable description of an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Description {
    /// Text or markup fragment
    Text(String),
    /// Per-element descriptions of an array, in index order
    List(Vec<Description>),
}

impl Description {
    pub fn text(text: impl Into<String>) -> Self {
        Description::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Description::Text(text) => Some(text),
            Description::List(_) => None,
        }
    }

    /// Markup form; list items are boxed inline
    pub fn to_html(&self) -> String {
        match self {
            Description::Text(text) => text.clone(),
            Description::List(items) => {
                let boxed: Vec<String> = items
                    .iter()
                    .map(|item| format!("<div style=\"display:inline-block;\">{}</div>", item.to_html()))
                    .collect();
                format!("[{}]", boxed.join(", "))
            }
        }
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Description::Text(text) => write!(f, "{}", text),
            Description::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<String> for Description {
    fn from(text: String) -> Self {
        Description::Text(text)
    }
}

impl From<&str> for Description {
    fn from(text: &str) -> Self {
        Description::Text(text.to_string())
    }
}
