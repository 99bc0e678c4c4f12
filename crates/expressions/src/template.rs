use std::fmt::Display;

use crate::{Error, Result};

/// A string with embedded `{{ expr }}` expressions.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    parts: Vec<Part>,
}

impl Template {
    /// Parses a template. `{{{{` stands for a literal `{{`.
    pub fn new(template: impl AsRef<str>) -> Result<Self> {
        let source = template.as_ref();
        let mut parts = vec![];
        let mut lit = String::new();
        let mut rest = source;
        while let Some(start) = rest.find("{{") {
            lit.push_str(&rest[..start]);
            let tail = &rest[start + 2..];
            if let Some(after) = tail.strip_prefix("{{") {
                lit.push_str("{{");
                rest = after;
                continue;
            }
            let Some((expr, after)) = tail.split_once("}}") else {
                return Err(Error::InvalidTemplate(format!(
                    "unmatched '{{{{' in {source:?}"
                )));
            };
            let expr = expr.trim();
            if expr.is_empty() {
                return Err(Error::InvalidTemplate(format!(
                    "empty expression in {source:?}"
                )));
            }
            if !lit.is_empty() {
                parts.push(Part::lit(std::mem::take(&mut lit)));
            }
            parts.push(Part::expr(expr));
            rest = after;
        }
        lit.push_str(rest);
        if !lit.is_empty() {
            parts.push(Part::lit(lit));
        }
        Ok(Template { parts })
    }

    /// True if the template contains no expressions.
    pub fn is_literal(&self) -> bool {
        self.parts.iter().all(|p| matches!(p, Part::Lit(_)))
    }

    /// The expressions referenced by this template, in order.
    pub fn expressions(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            Part::Expr(expr) => Some(expr.as_ref()),
            Part::Lit(_) => None,
        })
    }

    pub(crate) fn parts(&self) -> std::slice::Iter<Part> {
        self.parts.iter()
    }
}

impl Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.parts().try_for_each(|part| match part {
            Part::Lit(lit) => f.write_str(&lit.replace("{{", "{{{{")),
            Part::Expr(expr) => write!(f, "{{{{ {expr} }}}}"),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Part {
    Lit(Box<str>),
    Expr(Box<str>),
}

impl Part {
    pub fn lit(lit: impl Into<Box<str>>) -> Self {
        Self::Lit(lit.into())
    }

    pub fn expr(expr: impl Into<Box<str>>) -> Self {
        Self::Expr(expr.into())
    }
}
