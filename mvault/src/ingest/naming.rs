//! Storage names, storage paths and default titles

use uuid::Uuid;

/// Unique blob name: random v4 UUID prefix plus the original name
///
/// The prefix comes from a random source, so two uploads of the same file
/// in the same millisecond still get distinct names.
pub fn unique_file_name(original: &str) -> String {
    format!("{}_{}", Uuid::new_v4().simple(), original)
}

/// Storage path of a blob inside the owner's folder
pub fn storage_path(owner: &str, file_name: &str) -> String {
    format!("tracks/{}/{}", owner, file_name)
}

/// Default track title: file name without its last extension
///
/// A name that would become empty (`.mp3`) keeps its full text.
pub fn title_from_file_name(name: &str) -> String {
    if let Some(dot) = name.rfind('.') {
        let extension = &name[dot + 1..];
        let stem = &name[..dot];
        if !extension.is_empty() && !stem.is_empty() {
            return stem.to_string();
        }
    }
    name.to_string()
}
