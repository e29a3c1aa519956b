//! Content tree of pages and fragments.
//!
//! A tree is a list of rows, each row a list of [`Element`]s. Structural
//! containers are themselves rendered by standard widgets, so each container
//! type carries an implicit widget id (`pbContainer`, `pbTabsContainer`, ...).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const CONTAINER_WIDGET: &str = "pbContainer";
pub const TABS_CONTAINER_WIDGET: &str = "pbTabsContainer";
pub const TAB_CONTAINER_WIDGET: &str = "pbTabContainer";
pub const MODAL_CONTAINER_WIDGET: &str = "pbModalContainer";
pub const FORM_CONTAINER_WIDGET: &str = "pbFormContainer";

pub type Row = Vec<Element>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Element {
    Component(Component),
    Container(Container),
    TabsContainer(TabsContainer),
    ModalContainer(ModalContainer),
    FormContainer(FormContainer),
    Fragment(FragmentElement),
}

impl Element {
    /// The reference is a per-element identity, used by generated code.
    pub fn reference(&self) -> Option<&str> {
        match self {
            Element::Component(c) => c.reference.as_deref(),
            Element::Container(c) => c.reference.as_deref(),
            Element::TabsContainer(c) => c.reference.as_deref(),
            Element::ModalContainer(c) => c.reference.as_deref(),
            Element::FormContainer(c) => c.reference.as_deref(),
            Element::Fragment(f) => f.reference.as_deref(),
        }
    }

    pub fn reference_mut(&mut self) -> &mut Option<String> {
        match self {
            Element::Component(c) => &mut c.reference,
            Element::Container(c) => &mut c.reference,
            Element::TabsContainer(c) => &mut c.reference,
            Element::ModalContainer(c) => &mut c.reference,
            Element::FormContainer(c) => &mut c.reference,
            Element::Fragment(f) => &mut f.reference,
        }
    }

    /// Nested containers directly owned by this element.
    pub fn children_mut(&mut self) -> Vec<&mut Container> {
        match self {
            Element::Component(_) | Element::Fragment(_) => Vec::new(),
            Element::Container(c) => vec![c],
            Element::TabsContainer(t) => t.tabs.iter_mut().map(|tab| &mut tab.container).collect(),
            Element::ModalContainer(m) => vec![&mut m.container],
            Element::FormContainer(f) => vec![&mut f.container],
        }
    }
}

/// A widget instance; `id` is the widget id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default)]
    pub property_values: BTreeMap<String, Value>,
    #[serde(default)]
    pub dimension: BTreeMap<String, u32>,
}

impl Component {
    pub fn new(widget_id: impl Into<String>) -> Self {
        Self {
            id: widget_id.into(),
            ..Default::default()
        }
    }
}

fn container_widget() -> String {
    CONTAINER_WIDGET.to_string()
}

fn tabs_container_widget() -> String {
    TABS_CONTAINER_WIDGET.to_string()
}

fn tab_container_widget() -> String {
    TAB_CONTAINER_WIDGET.to_string()
}

fn modal_container_widget() -> String {
    MODAL_CONTAINER_WIDGET.to_string()
}

fn form_container_widget() -> String {
    FORM_CONTAINER_WIDGET.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    #[serde(default = "container_widget")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub property_values: BTreeMap<String, Value>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Container {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            id: container_widget(),
            reference: None,
            rows,
            property_values: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabsContainer {
    #[serde(default = "tabs_container_widget")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default)]
    pub tabs: Vec<TabContainer>,
    #[serde(default)]
    pub property_values: BTreeMap<String, Value>,
}

impl TabsContainer {
    pub fn new(tabs: Vec<TabContainer>) -> Self {
        Self {
            id: tabs_container_widget(),
            reference: None,
            tabs,
            property_values: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabContainer {
    #[serde(default = "tab_container_widget")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub container: Container,
}

impl TabContainer {
    pub fn new(title: impl Into<String>, container: Container) -> Self {
        Self {
            id: tab_container_widget(),
            title: title.into(),
            container,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalContainer {
    #[serde(default = "modal_container_widget")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default)]
    pub container: Container,
    #[serde(default)]
    pub property_values: BTreeMap<String, Value>,
}

impl ModalContainer {
    pub fn new(container: Container) -> Self {
        Self {
            id: modal_container_widget(),
            reference: None,
            container,
            property_values: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormContainer {
    #[serde(default = "form_container_widget")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default)]
    pub container: Container,
    #[serde(default)]
    pub property_values: BTreeMap<String, Value>,
}

impl FormContainer {
    pub fn new(container: Container) -> Self {
        Self {
            id: form_container_widget(),
            reference: None,
            container,
            property_values: BTreeMap::new(),
        }
    }
}

/// Embeds a fragment; `id` is the fragment id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentElement {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default)]
    pub binding: BTreeMap<String, String>,
}

impl FragmentElement {
    pub fn new(fragment_id: impl Into<String>) -> Self {
        Self {
            id: fragment_id.into(),
            ..Default::default()
        }
    }
}
