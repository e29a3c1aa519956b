use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::element::Row;
use super::page::Variable;
use super::{Artifact, ArtifactKind, Header};

/// A reusable slice of content, embedded through fragment elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub variables: BTreeMap<String, Variable>,
}

impl Fragment {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            header: Header::new(id, name),
            ..Default::default()
        }
    }
}

impl Artifact for Fragment {
    const KIND: ArtifactKind = ArtifactKind::Fragment;

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
