//! Maximum-information item selection.
//!
//! The selector is a pure function over its arguments: it never mutates the
//! candidate pool or any session state, and identical inputs always produce
//! the same choice.

use crate::error::{Error, Result};
use crate::irt;
use crate::types::{Item, ItemId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

/// Information values within this tolerance of each other count as tied.
const INFORMATION_TIE_TOLERANCE: f64 = 1e-9;

/// Content-area constraints applied when filtering a candidate pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionConstraints {
    /// When present, only items with one of these content tags are eligible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_tags: Option<BTreeSet<String>>,
}

impl SelectionConstraints {
    /// No constraints; the whole pool is eligible.
    pub fn any() -> Self {
        Self::default()
    }

    /// Restrict selection to the given content tags.
    pub fn for_content_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            content_tags: Some(tags.into_iter().map(Into::into).collect()),
        }
    }

    fn admits(&self, item: &Item) -> bool {
        match &self.content_tags {
            None => true,
            Some(tags) => tags.contains(&item.content_tag),
        }
    }
}

/// Pick the pool item carrying maximum Fisher information at `theta`.
///
/// Excluded ids and items outside the content constraint are filtered out.
/// Items with malformed IRT parameters are quarantined with a warning
/// instead of failing the session. Ties within floating tolerance resolve
/// to the earliest pool position, so selection is reproducible for
/// identical inputs.
pub fn select_optimal_item<'a>(
    theta: f64,
    excluded: &HashSet<ItemId>,
    constraints: &SelectionConstraints,
    pool: &'a [Item],
) -> Result<&'a Item> {
    let mut best: Option<(&Item, f64)> = None;

    for item in pool {
        if excluded.contains(&item.id) || !constraints.admits(item) {
            continue;
        }
        if let Err(err) = item.validate() {
            warn!(item = %item.id, "excluding item from selection: {err}");
            continue;
        }
        let information = irt::fisher_information(theta, &item.params);
        match best {
            Some((_, best_information))
                if information <= best_information + INFORMATION_TIE_TOLERANCE => {}
            _ => best = Some((item, information)),
        }
    }

    match best {
        Some((item, information)) => {
            debug!(item = %item.id, information, theta, "selected optimal item");
            Ok(item)
        }
        None => Err(Error::NoEligibleItems),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemParameters;

    fn item(id: &str, b: f64) -> Item {
        Item::new(id, "MATH", "node-1", ItemParameters::new(b, 1.5, 0.2))
    }

    #[test]
    fn picks_most_informative_item() {
        let pool = vec![item("far-low", -2.0), item("near", 0.1), item("far-high", 2.5)];
        let chosen = select_optimal_item(0.0, &HashSet::new(), &SelectionConstraints::any(), &pool)
            .unwrap();
        assert_eq!(chosen.id, ItemId::from("near"));
    }

    #[test]
    fn ties_resolve_to_earliest_pool_position() {
        let pool = vec![item("first", 0.5), item("twin", 0.5)];
        let chosen = select_optimal_item(0.0, &HashSet::new(), &SelectionConstraints::any(), &pool)
            .unwrap();
        assert_eq!(chosen.id, ItemId::from("first"));
    }

    #[test]
    fn excluded_items_are_skipped() {
        let pool = vec![item("near", 0.1), item("next", 0.8)];
        let excluded = HashSet::from([ItemId::from("near")]);
        let chosen =
            select_optimal_item(0.0, &excluded, &SelectionConstraints::any(), &pool).unwrap();
        assert_eq!(chosen.id, ItemId::from("next"));
    }

    #[test]
    fn empty_filtered_pool_is_an_error() {
        let pool = vec![item("only", 0.0)];
        let excluded = HashSet::from([ItemId::from("only")]);
        let result = select_optimal_item(0.0, &excluded, &SelectionConstraints::any(), &pool);
        assert!(matches!(result, Err(Error::NoEligibleItems)));

        let result =
            select_optimal_item(0.0, &HashSet::new(), &SelectionConstraints::any(), &[]);
        assert!(matches!(result, Err(Error::NoEligibleItems)));
    }

    #[test]
    fn invalid_parameters_are_quarantined() {
        let mut broken = item("broken", 0.0);
        broken.params.discrimination = -1.0;
        let pool = vec![broken, item("sound", 1.0)];
        let chosen = select_optimal_item(0.0, &HashSet::new(), &SelectionConstraints::any(), &pool)
            .unwrap();
        assert_eq!(chosen.id, ItemId::from("sound"));
    }

    #[test]
    fn content_constraints_filter_the_pool() {
        let mut geometry = item("geo", 1.5);
        geometry.content_tag = "geometry".to_string();
        let pool = vec![item("alg", 0.0), geometry];
        let constraints = SelectionConstraints::for_content_tags(["geometry"]);
        let chosen = select_optimal_item(0.0, &HashSet::new(), &constraints, &pool).unwrap();
        assert_eq!(chosen.id, ItemId::from("geo"));
    }
}
