//! Category → notebook bindings.
//!
//! The registry is built once at start-up from one configuration value per
//! category and is read-only afterwards. A value may list several notebook
//! ids separated by commas; only the first is used until multi-notebook
//! queries exist, and a warning is recorded.
//!
//! ```text
//! EXEOL_OPA   = "opa-1"        → opa-1
//! COMPETITOR  = "a, b"         → a        (warning)
//! GENERAL     = "gen"          → gen
//! UNKNOWN                      → gen      (alias of GENERAL)
//! ```
//!
//! The default notebook is the first non-empty binding in declaration
//! order: product lines, then competitor, then general.

use notebook_router_core::category::Category;
use std::collections::HashMap;

use crate::config::Config;

/// Static mapping from [`Category`] to a notebook id.
#[derive(Debug, Clone, Default)]
pub struct NotebookRegistry {
    bindings: HashMap<Category, String>,
    ids: Vec<String>,
    warnings: Vec<String>,
}

impl NotebookRegistry {
    /// Build from the `[notebooks]` table and `NOTEBOOK_ID_*` variables.
    pub fn from_config(config: &Config) -> Self {
        Self::from_lookup(|category| config.notebook_value(category))
    }

    /// Build from an arbitrary per-category value source.
    ///
    /// `lookup` is called once for every category except `UNKNOWN`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(Category) -> Option<String>,
    {
        let mut registry = NotebookRegistry::default();

        for category in Category::ROUTABLE {
            let raw = match lookup(category) {
                Some(raw) => raw,
                None => continue,
            };

            let (id, truncated) = first_notebook_id(&raw);
            if truncated {
                let message = format!(
                    "Multiple notebook ids found for {}. Using first one: {}",
                    category.env_key(),
                    id
                );
                tracing::warn!("{}", message);
                registry.warnings.push(message);
            }

            if id.is_empty() {
                continue;
            }
            if !registry.ids.contains(&id) {
                registry.ids.push(id.clone());
            }
            registry.bindings.insert(category, id);
        }

        if registry.ids.is_empty() {
            tracing::warn!("No notebook ids configured. Set NOTEBOOK_ID_* or [notebooks] in config.");
        } else {
            tracing::info!("Loaded {} notebook(s).", registry.ids.len());
        }

        registry
    }

    /// Notebook bound to `category`. `UNKNOWN` resolves like `GENERAL`.
    pub fn resolve(&self, category: Category) -> Option<&str> {
        self.bindings
            .get(&category.binding_source())
            .map(String::as_str)
    }

    /// Notebook a question of `category` is sent to: its own binding, else
    /// the default notebook. The flag is `true` for the fallback.
    pub fn route(&self, category: Category) -> Option<(&str, bool)> {
        match self.resolve(category) {
            Some(id) => Some((id, false)),
            None => self.default_notebook().map(|id| (id, true)),
        }
    }

    /// Distinct configured notebook ids in declaration order.
    pub fn notebook_ids(&self) -> &[String] {
        &self.ids
    }

    /// First configured notebook id.
    pub fn default_notebook(&self) -> Option<&str> {
        self.ids.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Diagnostics produced while building the registry.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Every category with its binding, for display.
    pub fn bindings(&self) -> Vec<(Category, Option<&str>)> {
        Category::ALL
            .iter()
            .map(|c| (*c, self.resolve(*c)))
            .collect()
    }
}

/// Keep the first comma-separated segment of `raw`, trimmed.
///
/// Returns the id and whether anything was dropped.
pub fn first_notebook_id(raw: &str) -> (String, bool) {
    match raw.split_once(',') {
        Some((first, _)) => (first.trim().to_string(), true),
        None => (raw.trim().to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(values: &[(Category, &str)]) -> NotebookRegistry {
        let map: HashMap<Category, String> = values
            .iter()
            .map(|(c, v)| (*c, v.to_string()))
            .collect();
        NotebookRegistry::from_lookup(|c| map.get(&c).cloned())
    }

    #[test]
    fn comma_list_keeps_first_and_warns() {
        let reg = registry(&[(Category::Competitor, "a,b"), (Category::General, "g")]);
        assert_eq!(reg.resolve(Category::Competitor), Some("a"));
        assert_eq!(reg.warnings().len(), 1);
        assert!(reg.warnings()[0].contains("NOTEBOOK_ID_COMPETITOR"));
    }

    #[test]
    fn unknown_aliases_general() {
        let reg = registry(&[(Category::General, " gen-1 ")]);
        assert_eq!(reg.resolve(Category::Unknown), Some("gen-1"));
        assert_eq!(reg.resolve(Category::Unknown), reg.resolve(Category::General));

        let empty = registry(&[]);
        assert_eq!(empty.resolve(Category::Unknown), None);
    }

    #[test]
    fn unknown_slot_is_never_looked_up() {
        let reg = NotebookRegistry::from_lookup(|c| {
            assert_ne!(c, Category::Unknown);
            None
        });
        assert!(reg.is_empty());
    }

    #[test]
    fn default_is_first_in_declaration_order() {
        let reg = registry(&[
            (Category::General, "gen"),
            (Category::Competitor, "comp"),
            (Category::ExeolSurf30, "surf"),
        ]);
        assert_eq!(reg.default_notebook(), Some("surf"));
        assert_eq!(reg.notebook_ids(), &["surf", "comp", "gen"]);
    }

    #[test]
    fn ids_are_distinct_and_empty_values_skipped() {
        let reg = registry(&[
            (Category::ExeolOpa, "shared"),
            (Category::ExeolGta, ""),
            (Category::ExeolClean4e, "  "),
            (Category::General, "shared"),
        ]);
        assert_eq!(reg.notebook_ids(), &["shared"]);
        assert_eq!(reg.resolve(Category::ExeolGta), None);
        assert_eq!(reg.resolve(Category::General), Some("shared"));
    }

    #[test]
    fn empty_registry_has_no_default() {
        let reg = registry(&[]);
        assert!(reg.is_empty());
        assert_eq!(reg.default_notebook(), None);
        assert_eq!(reg.bindings().len(), Category::ALL.len());
    }

    #[test]
    fn route_falls_back_to_default() {
        let reg = registry(&[(Category::ExeolGta, "gta"), (Category::General, "gen")]);
        assert_eq!(reg.route(Category::ExeolGta), Some(("gta", false)));
        assert_eq!(reg.route(Category::Competitor), Some(("gta", true)));
        assert_eq!(reg.route(Category::Unknown), Some(("gen", false)));
        assert_eq!(registry(&[]).route(Category::General), None);
    }

    #[test]
    fn first_segment_is_trimmed() {
        assert_eq!(first_notebook_id(" x , y,z"), ("x".to_string(), true));
        assert_eq!(first_notebook_id(" x "), ("x".to_string(), false));
        assert_eq!(first_notebook_id(",y"), (String::new(), true));
    }
}
