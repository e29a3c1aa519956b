use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Js,
    Css,
    Img,
    Json,
}

impl AssetType {
    /// Sub folder of `assets/` holding files of this type.
    pub fn dir_name(&self) -> &'static str {
        match self {
            AssetType::Js => "js",
            AssetType::Css => "css",
            AssetType::Img => "img",
            AssetType::Json => "json",
        }
    }
}

/// A named resource attached to an artifact.
///
/// External assets are URLs and have no file on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    #[serde(default)]
    pub order: i32,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub external: bool,
}

fn default_active() -> bool {
    true
}

impl Asset {
    pub fn new(name: impl Into<String>, asset_type: AssetType, order: i32) -> Self {
        Self {
            id: None,
            name: name.into(),
            asset_type,
            order,
            active: true,
            external: false,
        }
    }

    /// Path relative to the artifact folder, `None` for external assets.
    pub fn relative_path(&self) -> Option<String> {
        if self.external {
            None
        } else {
            Some(format!("assets/{}/{}", self.asset_type.dir_name(), self.name))
        }
    }
}
