//! # Content Tree Visitors
//!
//! Read-only walks over the rows of a page or fragment. The [`Visitor`] trait
//! has one method per element kind; default implementations descend into
//! nested containers, so a visitor only overrides the kinds it cares about.
//!
//! Two collectors drive the migration cascade and dependency status:
//!
//! - [`WidgetIdCollector`]: widget ids, including the implicit widgets of
//!   structural containers (`pbContainer`, `pbTabsContainer`, ...).
//! - [`FragmentIdCollector`]: fragment ids.
//!
//! Both can expand fragment elements through a [`FragmentSource`], so a page
//! reports the widgets used by the fragments it embeds. A fragment that cannot
//! be loaded is skipped with a warning. Reference cycles between fragments are
//! not detected.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::model::{
    Component, Container, Element, FormContainer, Fragment, FragmentElement, ModalContainer, Row,
    TabContainer, TabsContainer,
};

pub mod fragment_ids;
pub mod widget_ids;

pub use fragment_ids::FragmentIdCollector;
pub use widget_ids::WidgetIdCollector;

/// Where fragment elements are resolved during expansion.
pub trait FragmentSource {
    fn fragment(&self, id: &str) -> Result<Fragment>;
}

pub trait Visitor {
    fn visit_rows(&mut self, rows: &[Row]) {
        for row in rows {
            for element in row {
                self.visit_element(element);
            }
        }
    }

    fn visit_element(&mut self, element: &Element) {
        match element {
            Element::Component(c) => self.visit_component(c),
            Element::Container(c) => self.visit_container(c),
            Element::TabsContainer(t) => self.visit_tabs_container(t),
            Element::ModalContainer(m) => self.visit_modal_container(m),
            Element::FormContainer(f) => self.visit_form_container(f),
            Element::Fragment(f) => self.visit_fragment(f),
        }
    }

    fn visit_component(&mut self, _component: &Component) {}

    fn visit_container(&mut self, container: &Container) {
        self.visit_rows(&container.rows);
    }

    fn visit_tabs_container(&mut self, tabs: &TabsContainer) {
        for tab in &tabs.tabs {
            self.visit_tab_container(tab);
        }
    }

    fn visit_tab_container(&mut self, tab: &TabContainer) {
        self.visit_container(&tab.container);
    }

    fn visit_modal_container(&mut self, modal: &ModalContainer) {
        self.visit_container(&modal.container);
    }

    fn visit_form_container(&mut self, form: &FormContainer) {
        self.visit_container(&form.container);
    }

    fn visit_fragment(&mut self, _fragment: &FragmentElement) {}
}

/// Ids an element tree names directly: widgets, container widgets and
/// fragments, without expanding fragments.
pub fn referenced_ids(rows: &[Row]) -> BTreeSet<String> {
    let mut ids = WidgetIdCollector::new(None).collect(rows);
    ids.extend(FragmentIdCollector::new(None).collect(rows));
    ids
}

/// Widget ids used by `rows`, expanding fragments through `fragments`.
pub fn widget_ids(rows: &[Row], fragments: Option<&dyn FragmentSource>) -> BTreeSet<String> {
    WidgetIdCollector::new(fragments).collect(rows)
}

/// Fragment ids used by `rows`, nested ones included when `fragments` is set.
pub fn fragment_ids(rows: &[Row], fragments: Option<&dyn FragmentSource>) -> BTreeSet<String> {
    FragmentIdCollector::new(fragments).collect(rows)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referenced_ids_does_not_expand_fragments() {
        let rows = vec![vec![
            Element::Component(Component::new("customSlider")),
            Element::Fragment(FragmentElement::new("header")),
        ]];

        let ids = referenced_ids(&rows);
        let expected: BTreeSet<String> = ["customSlider", "header"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_default_walk_reaches_nested_components() {
        struct Counter(usize);
        impl Visitor for Counter {
            fn visit_component(&mut self, _: &Component) {
                self.0 += 1;
            }
        }

        let inner = Container::new(vec![vec![Element::Component(Component::new("pbText"))]]);
        let rows = vec![vec![
            Element::Component(Component::new("pbInput")),
            Element::TabsContainer(TabsContainer::new(vec![TabContainer::new("t", inner.clone())])),
            Element::ModalContainer(ModalContainer::new(inner.clone())),
            Element::FormContainer(FormContainer::new(inner)),
        ]];

        let mut counter = Counter(0);
        counter.visit_rows(&rows);
        assert_eq!(counter.0, 4);
    }
}
