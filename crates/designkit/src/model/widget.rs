//! Widget definitions.
//!
//! Standard widgets ship with the product and use the `pb` id prefix; custom
//! widgets are created by users with the `custom` prefix. Only custom widgets
//! may be deleted, exported or imported.
//!
//! On disk the template and controller live next to the descriptor as
//! `<id>.tpl.html` and `<id>.ctrl.js`; the JSON keeps `@<file>` sentinels.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

use super::{check_id, is_plain_file_name, Artifact, ArtifactKind, Header};
use crate::error::{DesignError, Result};

pub const STANDARD_PREFIX: &str = "pb";
pub const CUSTOM_PREFIX: &str = "custom";

const RESOURCE_SENTINEL: char = '@';

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub property_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bond: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl Property {
    pub fn new(name: impl Into<String>, property_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            property_type: property_type.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub required_modules: Vec<String>,
}

impl Widget {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        let custom = !id.starts_with(STANDARD_PREFIX);
        Self {
            header: Header::new(id, name),
            custom,
            ..Default::default()
        }
    }

    /// Widget id for a new custom widget named `name`.
    pub fn custom_id(name: &str) -> String {
        let trimmed = name.trim();
        let mut chars = trimmed.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        };
        format!("{}{}", CUSTOM_PREFIX, capitalized)
    }

    pub fn is_standard_id(id: &str) -> bool {
        id.starts_with(STANDARD_PREFIX)
    }

    pub fn template_file(&self) -> String {
        format!("{}.tpl.html", self.header.id)
    }

    pub fn controller_file(&self) -> String {
        format!("{}.ctrl.js", self.header.id)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

fn read_sentinel(dir: &Path, value: &str) -> Result<Option<String>> {
    match value.strip_prefix(RESOURCE_SENTINEL) {
        Some(file) => {
            if !is_plain_file_name(file) {
                return Err(DesignError::Validation(format!(
                    "widget resource '{}' must be a file next to the descriptor",
                    file
                )));
            }
            let path = dir.join(file);
            let content = fs::read_to_string(&path).map_err(|e| {
                DesignError::repository(format!("Cannot read widget resource {}", path.display()), e)
            })?;
            Ok(Some(content))
        }
        None => Ok(None),
    }
}

impl Artifact for Widget {
    const KIND: ArtifactKind = ArtifactKind::Widget;

    fn header(&self) -> &Header {
        &self.header
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn validate(&self) -> Result<()> {
        check_id(ArtifactKind::Widget, &self.header.id)?;
        if self.header.name.trim().is_empty() {
            return Err(DesignError::Validation(format!(
                "widget {} must have a name",
                self.header.id
            )));
        }
        Ok(())
    }

    fn deletable(&self) -> bool {
        self.custom
    }

    fn detach_resources(&mut self) -> Vec<(String, String)> {
        let mut files = Vec::new();
        if !self.template.starts_with(RESOURCE_SENTINEL) {
            let file = self.template_file();
            let content = std::mem::replace(&mut self.template, format!("@{}", file));
            files.push((file, content));
        }
        if let Some(controller) = self.controller.as_mut() {
            if !controller.starts_with(RESOURCE_SENTINEL) {
                let file = format!("{}.ctrl.js", self.header.id);
                let content = std::mem::replace(controller, format!("@{}", file));
                files.push((file, content));
            }
        }
        files
    }

    fn attach_resources(&mut self, dir: &Path) -> Result<()> {
        if let Some(template) = read_sentinel(dir, &self.template)? {
            self.template = template;
        }
        if let Some(controller) = self.controller.as_deref() {
            if let Some(content) = read_sentinel(dir, controller)? {
                self.controller = Some(content);
            }
        }
        Ok(())
    }
}
