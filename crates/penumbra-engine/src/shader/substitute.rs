use std::collections::BTreeMap;

use crate::drawable::is_identifier;
use crate::renderer::ConfigError;

/// Upper bound on re-scans; nested placeholders deeper than this are a cycle.
const MAX_PASSES: usize = 16;

/// Value bound to a `{name}` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SubstitutionValue {
    Text(String),
    /// Emitted in float literal form (`3` becomes `3.0`).
    Number(f64),
}

impl SubstitutionValue {
    fn render(&self) -> String {
        match self {
            SubstitutionValue::Text(text) => text.clone(),
            SubstitutionValue::Number(n) => float_literal(*n),
        }
    }
}

impl From<&str> for SubstitutionValue {
    fn from(v: &str) -> Self {
        SubstitutionValue::Text(v.to_string())
    }
}

impl From<String> for SubstitutionValue {
    fn from(v: String) -> Self {
        SubstitutionValue::Text(v)
    }
}

impl From<f32> for SubstitutionValue {
    fn from(v: f32) -> Self {
        SubstitutionValue::Number(f64::from(v))
    }
}

impl From<f64> for SubstitutionValue {
    fn from(v: f64) -> Self {
        SubstitutionValue::Number(v)
    }
}

impl From<u32> for SubstitutionValue {
    fn from(v: u32) -> Self {
        SubstitutionValue::Number(f64::from(v))
    }
}

/// Named placeholder values for one program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitutions {
    values: BTreeMap<String, SubstitutionValue>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<SubstitutionValue>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<SubstitutionValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Adds every entry of `other`, overriding existing names.
    pub fn extend(&mut self, other: &Substitutions) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&SubstitutionValue> {
        self.values.get(name)
    }
}

/// Replaces `{name}` placeholders until none remain.
///
/// Replacement text is scanned again, so values may themselves contain
/// placeholders. Braces that do not enclose an identifier are left alone.
pub fn substitute(template: &str, substitutions: &Substitutions) -> Result<String, ConfigError> {
    let mut current = template.to_string();
    for _ in 0..MAX_PASSES {
        let (next, replaced) = substitute_once(&current, substitutions)?;
        if !replaced {
            return Ok(next);
        }
        current = next;
    }
    Err(ConfigError::SubstitutionCycle(MAX_PASSES))
}

fn substitute_once(source: &str, substitutions: &Substitutions) -> Result<(String, bool), ConfigError> {
    let mut out = String::with_capacity(source.len());
    let mut replaced = false;
    let mut rest = source;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let name = after.find('}').map(|close| &after[..close]);

        match name {
            Some(name) if is_identifier(name) => {
                let value = substitutions
                    .get(name)
                    .ok_or_else(|| ConfigError::UnresolvedPlaceholder(name.to_string()))?;
                out.push_str(&value.render());
                replaced = true;
                rest = &after[name.len() + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    Ok((out, replaced))
}

/// Formats a number so WGSL parses it as `f32`.
pub(crate) fn float_literal(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 {
        format!("{n:.1}")
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_text_and_numbers() {
        let subs = Substitutions::new()
            .with("count", 3u32)
            .with("ratio", 0.25f32)
            .with("name", "circle");
        let out = substitute("let n = {count}; let r = {ratio}; // {name}", &subs).unwrap();
        assert_eq!(out, "let n = 3.0; let r = 0.25; // circle");
    }

    #[test]
    fn replacement_text_is_rescanned() {
        let subs = Substitutions::new()
            .with("outer", "a({inner})")
            .with("inner", "{leaf}")
            .with("leaf", 2u32);
        assert_eq!(substitute("{outer}", &subs).unwrap(), "a(2.0)");
    }

    #[test]
    fn unresolved_placeholder_fails() {
        let err = substitute("x = {missing};", &Substitutions::new()).unwrap_err();
        assert_eq!(err, ConfigError::UnresolvedPlaceholder("missing".into()));
    }

    #[test]
    fn cycles_are_bounded() {
        let subs = Substitutions::new().with("a", "{b}").with("b", "{a}");
        assert!(matches!(substitute("{a}", &subs), Err(ConfigError::SubstitutionCycle(_))));
    }

    #[test]
    fn code_blocks_are_untouched() {
        let src = "fn f() {\n    if (x) { return; }\n}";
        assert_eq!(substitute(src, &Substitutions::new()).unwrap(), src);
    }

    #[test]
    fn negative_and_fractional_literals() {
        assert_eq!(float_literal(-2.0), "-2.0");
        assert_eq!(float_literal(1.5), "1.5");
        assert_eq!(float_literal(400.0), "400.0");
    }
}
