use std::collections::BTreeMap;
use std::fmt;

/// A leaf or subtree in [`Insights`].
#[derive(Debug, Clone, PartialEq)]
pub enum InsightValue {
    Number(f64),
    Flag(bool),
    Text(String),
    Group(BTreeMap<String, InsightValue>),
}

impl From<f64> for InsightValue {
    fn from(v: f64) -> Self {
        InsightValue::Number(v)
    }
}

impl From<f32> for InsightValue {
    fn from(v: f32) -> Self {
        InsightValue::Number(f64::from(v))
    }
}

impl From<usize> for InsightValue {
    fn from(v: usize) -> Self {
        InsightValue::Number(v as f64)
    }
}

impl From<bool> for InsightValue {
    fn from(v: bool) -> Self {
        InsightValue::Flag(v)
    }
}

impl From<String> for InsightValue {
    fn from(v: String) -> Self {
        InsightValue::Text(v)
    }
}

impl From<&str> for InsightValue {
    fn from(v: &str) -> Self {
        InsightValue::Text(v.to_string())
    }
}

/// Diagnostics written by the renderer, addressed by key paths such as
/// `["render pass", "distance", "tile count"]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Insights {
    root: BTreeMap<String, InsightValue>,
}

impl Insights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value at `path`, turning leaves on the way into groups.
    pub fn set(&mut self, path: &[&str], value: impl Into<InsightValue>) {
        let Some((last, parents)) = path.split_last() else {
            return;
        };
        let mut group = &mut self.root;
        for key in parents {
            let entry = group
                .entry((*key).to_string())
                .or_insert_with(|| InsightValue::Group(BTreeMap::new()));
            if !matches!(entry, InsightValue::Group(_)) {
                *entry = InsightValue::Group(BTreeMap::new());
            }
            let InsightValue::Group(next) = entry else {
                return;
            };
            group = next;
        }
        group.insert((*last).to_string(), value.into());
    }

    pub fn get(&self, path: &[&str]) -> Option<&InsightValue> {
        let (first, rest) = path.split_first()?;
        let mut value = self.root.get(*first)?;
        for key in rest {
            let InsightValue::Group(group) = value else {
                return None;
            };
            value = group.get(*key)?;
        }
        Some(value)
    }

    pub fn number(&self, path: &[&str]) -> Option<f64> {
        match self.get(path)? {
            InsightValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn flag(&self, path: &[&str]) -> Option<bool> {
        match self.get(path)? {
            InsightValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn text(&self, path: &[&str]) -> Option<&str> {
        match self.get(path)? {
            InsightValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

impl fmt::Display for Insights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_group(
            f: &mut fmt::Formatter<'_>,
            group: &BTreeMap<String, InsightValue>,
            depth: usize,
        ) -> fmt::Result {
            for (key, value) in group {
                write!(f, "{:indent$}{key}:", "", indent = depth * 2)?;
                match value {
                    InsightValue::Number(n) => writeln!(f, " {n:.3}")?,
                    InsightValue::Flag(b) => writeln!(f, " {b}")?,
                    InsightValue::Text(s) => writeln!(f, " {s}")?,
                    InsightValue::Group(g) => {
                        writeln!(f)?;
                        write_group(f, g, depth + 1)?;
                    }
                }
            }
            Ok(())
        }
        write_group(f, &self.root, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_paths_round_trip() {
        let mut insights = Insights::new();
        insights.set(&["render pass", "distance", "tile count"], 64usize);
        insights.set(&["render pass", "lights", "render scale"], 0.5f32);
        insights.set(&["hardware", "adapter"], "mock adapter");
        insights.set(&["soft shadows"], true);

        assert_eq!(insights.number(&["render pass", "distance", "tile count"]), Some(64.0));
        assert_eq!(insights.number(&["render pass", "lights", "render scale"]), Some(0.5));
        assert_eq!(insights.text(&["hardware", "adapter"]), Some("mock adapter"));
        assert_eq!(insights.flag(&["soft shadows"]), Some(true));
        assert_eq!(insights.get(&["render pass", "missing"]), None);
        assert_eq!(insights.number(&["hardware", "adapter"]), None);
    }

    #[test]
    fn leaf_becomes_group_when_extended() {
        let mut insights = Insights::new();
        insights.set(&["compile"], 1usize);
        insights.set(&["compile", "programs"], 9usize);
        assert_eq!(insights.number(&["compile", "programs"]), Some(9.0));
        assert!(insights.to_string().contains("  programs: 9.000"));
    }
}
