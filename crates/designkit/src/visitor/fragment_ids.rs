use std::collections::BTreeSet;
use tracing::warn;

use super::{FragmentSource, Visitor};
use crate::model::{FragmentElement, Row};

/// Collects the fragment ids a tree embeds.
///
/// With a source, nested fragments are followed and reported too.
pub struct FragmentIdCollector<'a> {
    ids: BTreeSet<String>,
    fragments: Option<&'a dyn FragmentSource>,
}

impl<'a> FragmentIdCollector<'a> {
    pub fn new(fragments: Option<&'a dyn FragmentSource>) -> Self {
        Self {
            ids: BTreeSet::new(),
            fragments,
        }
    }

    pub fn collect(mut self, rows: &[Row]) -> BTreeSet<String> {
        self.visit_rows(rows);
        self.ids
    }
}

impl Visitor for FragmentIdCollector<'_> {
    fn visit_fragment(&mut self, element: &FragmentElement) {
        self.ids.insert(element.id.clone());
        let Some(source) = self.fragments else {
            return;
        };
        match source.fragment(&element.id) {
            Ok(fragment) => self.visit_rows(&fragment.rows),
            Err(e) => warn!(fragment = %element.id, error = %e, "Skipping unavailable fragment"),
        }
    }
}
