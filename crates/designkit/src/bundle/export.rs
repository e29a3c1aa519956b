use std::io::{Cursor, Seek, Write};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use super::{ASSETS_DIR, RESOURCES_DIR};
use crate::error::{DesignError, Result};
use crate::migration::DependencyGraph;
use crate::model::ArtifactKind;
use crate::workspace::{Workspace, WorkspaceArtifact};

fn export_failed(kind: ArtifactKind, id: &str, cause: DesignError) -> DesignError {
    DesignError::ExportFailed {
        message: format!("Cannot export {} {}", kind, id),
        source: Some(Box::new(cause)),
    }
}

fn zip_failed(e: zip::result::ZipError) -> DesignError {
    DesignError::repository("Cannot write bundle", e)
}

/// Writes the bundle of `id` into `writer`.
///
/// A blank id is rejected before anything is written. Any later failure,
/// including a missing artifact, is an [`DesignError::ExportFailed`]
/// carrying the cause.
pub fn export_to<A, W>(workspace: &Workspace, id: &str, writer: W) -> Result<()>
where
    A: WorkspaceArtifact,
    W: Write + Seek,
{
    if id.trim().is_empty() {
        return Err(DesignError::Validation(format!(
            "{} id is required to export",
            A::KIND
        )));
    }

    let artifact = workspace
        .get::<A>(id)
        .map_err(|e| export_failed(A::KIND, id, e))?;
    if !artifact.exportable() {
        return Err(export_failed(
            A::KIND,
            id,
            DesignError::NotAllowed(format!("{} {} is provided by the product", A::KIND, id)),
        ));
    }

    write_bundle(workspace, &artifact, writer).map_err(|e| export_failed(A::KIND, id, e))?;
    debug!(kind = %A::KIND, id = %id, "Exported bundle");
    Ok(())
}

/// The bundle of `id` as zip bytes.
pub fn export<A: WorkspaceArtifact>(workspace: &Workspace, id: &str) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    export_to::<A, _>(workspace, id, &mut cursor)?;
    Ok(cursor.into_inner())
}

fn write_bundle<A, W>(workspace: &Workspace, artifact: &A, writer: W) -> Result<()>
where
    A: WorkspaceArtifact,
    W: Write + Seek,
{
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    // 1. Root descriptor, resources inline
    let descriptor = serde_json::to_vec_pretty(artifact)?;
    zip.start_file(
        format!("{}/{}", RESOURCES_DIR, A::KIND.descriptor_name()),
        options,
    )
    .map_err(zip_failed)?;
    zip.write_all(&descriptor)?;

    // 2. Root assets
    let root_dir = A::store(workspace).resolve_path(artifact.id());
    add_dir(
        &mut zip,
        &root_dir.join(ASSETS_DIR),
        &format!("{}/{}", RESOURCES_DIR, ASSETS_DIR),
        options,
    )?;

    // 3. Dependencies, laid out like their stores
    for kind in [ArtifactKind::Fragment, ArtifactKind::Widget] {
        for id in workspace.referenced_ids(kind, artifact.rows()) {
            let folder = match kind {
                ArtifactKind::Fragment => workspace.fragments().resolve_path(&id),
                _ => workspace.widgets().resolve_path(&id),
            };
            if !folder.is_dir() {
                warn!(kind = %kind, id = %id, "Skipping missing dependency in bundle");
                continue;
            }
            add_dir(
                &mut zip,
                &folder,
                &format!("{}/{}/{}", RESOURCES_DIR, kind.bundle_folder(), id),
                options,
            )?;
        }
    }

    zip.finish().map_err(zip_failed)?;
    Ok(())
}

/// Adds every non hidden file below `dir` under the `prefix` entry folder.
fn add_dir<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    dir: &Path,
    prefix: &str,
    options: FileOptions,
) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry =
            entry.map_err(|e| DesignError::repository(format!("Cannot walk {}", dir.display()), e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let content = std::fs::read(entry.path()).map_err(|e| {
            DesignError::repository(format!("Cannot read {}", entry.path().display()), e)
        })?;
        zip.start_file(format!("{}/{}", prefix, name), options)
            .map_err(zip_failed)?;
        zip.write_all(&content)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Page, Widget};
    use crate::test_utils::{component, custom_widget, fragment_element, legacy_fragment, row, TestEnv};
    use std::collections::BTreeSet;
    use zip::ZipArchive;

    fn entry_names(bytes: Vec<u8>) -> BTreeSet<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_blank_id_is_rejected_before_writing() {
        let env = TestEnv::new();
        let mut out = Cursor::new(Vec::new());

        let result = export_to::<Page, _>(&env.workspace, "  ", &mut out);

        assert!(matches!(result, Err(DesignError::Validation(_))));
        assert!(out.get_ref().is_empty());
    }

    #[test]
    fn test_missing_artifact_is_export_failed() {
        let env = TestEnv::new();
        let err = export::<Page>(&env.workspace, "ghost").unwrap_err();
        match err {
            DesignError::ExportFailed { source: Some(cause), .. } => assert!(cause.is_not_found()),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_page_bundle_contains_custom_dependencies_and_assets() {
        let env = TestEnv::new();
        let ws = &env.workspace;
        ws.widgets().save(custom_widget("customLogo")).unwrap();
        ws.widgets().save(Widget::new("pbText", "Text")).unwrap();
        ws.fragments()
            .save(legacy_fragment("header", "uuid-header", row(vec![component("customLogo")])))
            .unwrap();
        let mut page = ws.create(Page::new("", "home")).unwrap();
        page.rows = row(vec![component("pbText"), fragment_element("header")]);
        ws.save(page).unwrap();
        let assets = ws.pages().resolve_path("home").join("assets/css");
        std::fs::create_dir_all(&assets).unwrap();
        std::fs::write(assets.join("style.css"), "body {}").unwrap();

        let names = entry_names(export::<Page>(ws, "home").unwrap());

        assert!(names.contains("resources/page.json"));
        assert!(names.contains("resources/assets/css/style.css"));
        assert!(names.contains("resources/fragments/header/header.json"));
        assert!(names.contains("resources/widgets/customLogo/customLogo.json"));
        assert!(names.contains("resources/widgets/customLogo/customLogo.tpl.html"));
        assert!(!names.iter().any(|n| n.contains("pbText")));
    }

    #[test]
    fn test_widget_bundle_holds_only_the_widget() {
        let env = TestEnv::new();
        env.workspace.widgets().save(custom_widget("customLogo")).unwrap();

        let names = entry_names(export::<Widget>(&env.workspace, "customLogo").unwrap());

        assert_eq!(names.len(), 1);
        assert!(names.contains("resources/widget.json"));
    }

    #[test]
    fn test_standard_widget_cannot_be_exported() {
        let env = TestEnv::new();
        env.workspace.widgets().save(Widget::new("pbText", "Text")).unwrap();

        let result = export::<Widget>(&env.workspace, "pbText");
        assert!(matches!(result, Err(DesignError::ExportFailed { .. })));
    }
}
