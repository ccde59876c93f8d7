//! Entry-point discovery.

use itertools::Itertools;

use super::file::CONFIG_EXTENSION;

/// Filenames that seed discovery when found at the root.
pub const ROOT_FILES: &[&str] = &["configuration.yaml", "ui-lovelace.yaml"];

/// Every configuration file under these folders is a root of its own.
pub const ROOT_FOLDERS: &[&str] = &["blueprints/automation/", "blueprints/script/"];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RootFiles {
    /// Folder holding the configuration when it is not the project root.
    pub implicit_root: Option<String>,
    /// Root files, relative to `implicit_root` when there is one.
    pub files: Vec<String>,
}

impl RootFiles {
    /// Project-relative path of one of `files`.
    pub fn project_path(&self, file: &str) -> String {
        match &self.implicit_root {
            Some(root) => format!("{root}/{file}"),
            None => file.to_string(),
        }
    }
}

/// Pick the root files out of a recursive, project-relative listing.
///
/// When nothing matches at the project root, the first listed file whose
/// name is in [`ROOT_FILES`] marks a nested configuration folder and the
/// lists are applied again relative to it.
pub fn locate_root_files(listing: &[String]) -> RootFiles {
    let files = matching(listing.iter().map(String::as_str));
    if !files.is_empty() {
        return RootFiles {
            implicit_root: None,
            files,
        };
    }

    let nested_root = listing.iter().find_map(|path| {
        let (folder, name) = path.rsplit_once('/')?;
        ROOT_FILES.contains(&name).then(|| folder.to_string())
    });

    match nested_root {
        Some(root) => {
            let prefix = format!("{root}/");
            let files = matching(listing.iter().filter_map(|path| path.strip_prefix(&prefix)));
            RootFiles {
                implicit_root: Some(root),
                files,
            }
        }
        None => RootFiles::default(),
    }
}

fn matching<'a>(paths: impl Iterator<Item = &'a str>) -> Vec<String> {
    paths
        .filter(|path| {
            ROOT_FILES.contains(path)
                || ROOT_FOLDERS
                    .iter()
                    .any(|folder| path.starts_with(folder) && path.ends_with(CONFIG_EXTENSION))
        })
        .map(String::from)
        .unique()
        .collect()
}
