use crate::config::{DesignerConfig, WorkspacePaths};
use crate::model::{Component, Element, Fragment, FragmentElement, Page, Row, Widget};
use crate::workspace::Workspace;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestEnv {
    // We keep _temp_dir to ensure the directory is not dropped until the test is done
    pub _temp_dir: TempDir,
    pub workspace: Arc<Workspace>,
    pub root: PathBuf,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        let workspace = Workspace::open(&DesignerConfig::for_workspace(&root))
            .expect("failed to open workspace");
        Self {
            _temp_dir: temp_dir,
            workspace: Arc::new(workspace),
            root,
        }
    }

    pub fn paths(&self) -> WorkspacePaths {
        WorkspacePaths::from_root(&self.root)
    }

    pub fn config(&self) -> DesignerConfig {
        DesignerConfig::for_workspace(&self.root)
    }
}

/// One row holding the given elements.
pub fn row(elements: Vec<Element>) -> Vec<Row> {
    vec![elements]
}

pub fn component(widget_id: &str) -> Element {
    Element::Component(Component::new(widget_id))
}

pub fn fragment_element(fragment_id: &str) -> Element {
    Element::Fragment(FragmentElement::new(fragment_id))
}

/// A page as an older build would have written it.
pub fn legacy_page(id: &str, uuid: &str, rows: Vec<Row>) -> Page {
    let mut page = Page::new(id, id);
    page.header.uuid = Some(uuid.to_string());
    page.header.model_version = Some("2.0".to_string());
    page.rows = rows;
    page
}

pub fn legacy_fragment(id: &str, uuid: &str, rows: Vec<Row>) -> Fragment {
    let mut fragment = Fragment::new(id, id);
    fragment.header.uuid = Some(uuid.to_string());
    fragment.header.model_version = Some("2.0".to_string());
    fragment.rows = rows;
    fragment
}

pub fn custom_widget(id: &str) -> Widget {
    let mut widget = Widget::new(id, id);
    widget.header.model_version = Some("2.0".to_string());
    widget.template = format!("<div class=\"{}\"></div>", id);
    widget.controller = Some("function ($scope) {}".to_string());
    widget
}
