//! Provenance: why did this entry happen?
//!
//! Every dispatched entry records the rule that produced it and the entries
//! that rule matched. Following those links back yields a tree rooted at the
//! entry and ending at the trace's seed.

use std::fmt;
use std::sync::Arc;

use crate::action::ActionEntry;

/// The causal tree of one entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Why {
    /// Index of the entry in its trace.
    pub index: usize,
    /// The entry's action name.
    pub action: Arc<str>,
    /// Whether the entry recorded an error.
    pub failed: bool,
    /// The rule that produced it; `None` for the seed.
    pub rule: Option<Arc<str>>,
    /// Causes of the matched entries, in pattern order.
    pub because: Vec<Why>,
}

impl Why {
    /// Depth of the tree; a seed has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.because.iter().map(Self::depth).max().unwrap_or(0)
    }

    /// Rule names along the tree, outermost first, without duplicates.
    #[must_use]
    pub fn rules(&self) -> Vec<&str> {
        let mut rules = Vec::new();
        self.collect_rules(&mut rules);
        rules
    }

    fn collect_rules<'a>(&'a self, rules: &mut Vec<&'a str>) {
        if let Some(rule) = &self.rule {
            if !rules.contains(&&**rule) {
                rules.push(rule);
            }
        }
        for cause in &self.because {
            cause.collect_rules(rules);
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}[{}] {}", "", self.index, self.action, indent = depth * 2)?;
        if self.failed {
            write!(f, " (error)")?;
        }
        match &self.rule {
            Some(rule) => writeln!(f, " <- {rule}")?,
            None => writeln!(f, " (seed)")?,
        }
        for cause in &self.because {
            cause.write_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Why {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

/// Answers provenance queries over a trace's entries.
pub struct Provenance;

impl Provenance {
    /// Builds the causal tree of the entry at `index`.
    ///
    /// Returns `None` if there is no such entry.
    #[must_use]
    pub fn why(entries: &[ActionEntry], index: usize) -> Option<Why> {
        let entry = entries.get(index)?;
        let because = entry
            .cause
            .iter()
            .flat_map(|cause| cause.matched.iter())
            // Causes always precede their effects.
            .filter(|&&matched| matched < index)
            .filter_map(|&matched| Self::why(entries, matched))
            .collect();

        Some(Why {
            index,
            action: Arc::clone(&entry.name),
            failed: entry.is_error(),
            rule: entry.cause.as_ref().map(|c| Arc::clone(&c.rule)),
            because,
        })
    }
}
