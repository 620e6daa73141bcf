//! Table selection with `*` wildcard patterns.

use crate::config::ConfigError;
use crate::discover::DiscoveredTable;

/// Which discovered tables a run works on.
///
/// An empty include list selects every table. Skip patterns win over
/// include patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableFilter {
    pub tables: Vec<String>,
    pub skip_tables: Vec<String>,
}

impl TableFilter {
    /// Select everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(tables: Vec<String>, skip_tables: Vec<String>) -> Self {
        Self {
            tables,
            skip_tables,
        }
    }

    pub fn is_selected(&self, name: &str) -> bool {
        let included =
            self.tables.is_empty() || self.tables.iter().any(|p| matches_pattern(p, name));
        included && !self.skip_tables.iter().any(|p| matches_pattern(p, name))
    }

    /// Keep the selected tables, preserving their order.
    ///
    /// A literal include pattern naming a table that was not discovered is
    /// an error, so typos do not silently sync nothing.
    pub fn apply(
        &self,
        tables: Vec<DiscoveredTable>,
    ) -> Result<Vec<DiscoveredTable>, ConfigError> {
        for pattern in self.tables.iter().filter(|p| !p.contains('*')) {
            if !tables.iter().any(|t| &t.name == pattern) {
                return Err(ConfigError::UnknownTable(pattern.clone()));
            }
        }

        let selected: Vec<DiscoveredTable> = tables
            .into_iter()
            .filter(|t| self.is_selected(&t.name))
            .collect();
        tracing::debug!("Selected {} tables", selected.len());
        Ok(selected)
    }
}

/// Glob match where `*` matches any run of characters.
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut p, mut n) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, n));
            p += 1;
        } else if p < pattern.len() && pattern[p] == name[n] {
            p += 1;
            n += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            n = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> DiscoveredTable {
        DiscoveredTable::new(name, "")
    }

    fn names(tables: &[DiscoveredTable]) -> Vec<&str> {
        tables.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_matches_pattern() {
        assert!(matches_pattern("logs", "logs"));
        assert!(!matches_pattern("logs", "logs_2024"));
        assert!(matches_pattern("logs*", "logs_2024"));
        assert!(matches_pattern("*", ""));
        assert!(matches_pattern("*_cpu", "metrics_cpu"));
        assert!(matches_pattern("data_*_2024", "data_eu_west_2024"));
        assert!(!matches_pattern("data_*_2024", "data_eu_west_2025"));
        assert!(matches_pattern("a*b*c", "aXbYbZc"));
        assert!(!matches_pattern("", "x"));
    }

    #[test]
    fn test_empty_filter_selects_all() {
        let filter = TableFilter::all();
        let selected = filter
            .apply(vec![table("a"), table("b")])
            .unwrap();
        assert_eq!(names(&selected), vec!["a", "b"]);
    }

    #[test]
    fn test_include_and_skip() {
        let filter = TableFilter::new(
            vec!["data_*".to_string(), "logs".to_string()],
            vec!["data_2023".to_string()],
        );
        let selected = filter
            .apply(vec![
                table("data_2023"),
                table("data_2024"),
                table("logs"),
                table("metrics_cpu"),
            ])
            .unwrap();
        assert_eq!(names(&selected), vec!["data_2024", "logs"]);
    }

    #[test]
    fn test_unknown_literal_table_is_error() {
        let filter = TableFilter::new(vec!["missing".to_string()], vec![]);
        let err = filter.apply(vec![table("logs")]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTable(ref t) if t == "missing"));
    }

    #[test]
    fn test_wildcard_matching_nothing_is_fine() {
        let filter = TableFilter::new(vec!["nothing_*".to_string()], vec![]);
        assert!(filter.apply(vec![table("logs")]).unwrap().is_empty());
    }
}
