use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::element::Row;
use super::{Artifact, ArtifactKind, Header};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    #[default]
    Page,
    Form,
    Layout,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Constant,
    Json,
    Expression,
    Url,
    UrlParameter,
    BusinessData,
}

/// A named data definition of a page or fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    #[serde(rename = "type", default)]
    pub data_type: DataType,
    #[serde(default)]
    pub display_value: String,
    #[serde(default)]
    pub exposed: bool,
}

impl Variable {
    pub fn new(data_type: DataType, display_value: impl Into<String>) -> Self {
        Self {
            data_type,
            display_value: display_value.into(),
            exposed: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(flatten)]
    pub header: Header,
    #[serde(rename = "type", default)]
    pub page_type: PageType,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub variables: BTreeMap<String, Variable>,
}

impl Page {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            header: Header::new(id, name),
            ..Default::default()
        }
    }
}

impl Artifact for Page {
    const KIND: ArtifactKind = ArtifactKind::Page;

    fn header(&self) -> &Header {
        &self.header
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn rows(&self) -> &[Row] {
        &self.rows
    }

    fn rows_mut(&mut self) -> Option<&mut Vec<Row>> {
        Some(&mut self.rows)
    }

    fn variables_mut(&mut self) -> Option<&mut BTreeMap<String, Variable>> {
        Some(&mut self.variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Element;

    #[test]
    fn test_page_document_round_trip_keeps_header_flat() {
        let json = r#"{
            "id": "myPage",
            "uuid": "abc",
            "name": "myPage",
            "type": "form",
            "modelVersion": "2.0",
            "rows": [[{"type":"component","id":"pbText"}]],
            "variables": {"user": {"type":"url","displayValue":"../api","exposed":false}}
        }"#;
        let page: Page = serde_json::from_str(json).unwrap();

        assert_eq!(page.id(), "myPage");
        assert_eq!(page.uuid(), Some("abc"));
        assert_eq!(page.page_type, PageType::Form);
        assert_eq!(page.header.model_version.as_deref(), Some("2.0"));
        assert!(matches!(&page.rows[0][0], Element::Component(c) if c.id == "pbText"));
        assert_eq!(page.variables["user"].data_type, DataType::Url);

        let back = serde_json::to_value(&page).unwrap();
        assert_eq!(back["id"], "myPage");
        assert_eq!(back["type"], "form");
        assert_eq!(back["modelVersion"], "2.0");
    }
}
