use std::collections::BTreeSet;
use tracing::warn;

use super::{FragmentSource, Visitor};
use crate::model::{
    Component, Container, FormContainer, FragmentElement, ModalContainer, Row, TabContainer,
    TabsContainer,
};

/// Collects every widget id a tree uses.
pub struct WidgetIdCollector<'a> {
    ids: BTreeSet<String>,
    fragments: Option<&'a dyn FragmentSource>,
}

impl<'a> WidgetIdCollector<'a> {
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

impl Visitor for WidgetIdCollector<'_> {
    fn visit_component(&mut self, component: &Component) {
        self.ids.insert(component.id.clone());
    }

    fn visit_container(&mut self, container: &Container) {
        self.ids.insert(container.id.clone());
        self.visit_rows(&container.rows);
    }

    fn visit_tabs_container(&mut self, tabs: &TabsContainer) {
        self.ids.insert(tabs.id.clone());
        for tab in &tabs.tabs {
            self.visit_tab_container(tab);
        }
    }

    fn visit_tab_container(&mut self, tab: &TabContainer) {
        self.ids.insert(tab.id.clone());
        self.visit_container(&tab.container);
    }

    fn visit_modal_container(&mut self, modal: &ModalContainer) {
        self.ids.insert(modal.id.clone());
        self.visit_container(&modal.container);
    }

    fn visit_form_container(&mut self, form: &FormContainer) {
        self.ids.insert(form.id.clone());
        self.visit_container(&form.container);
    }

    fn visit_fragment(&mut self, element: &FragmentElement) {
        let Some(source) = self.fragments else {
            return;
        };
        match source.fragment(&element.id) {
            Ok(fragment) => self.visit_rows(&fragment.rows),
            Err(e) => warn!(fragment = %element.id, error = %e, "Skipping unavailable fragment"),
        }
    }
}
