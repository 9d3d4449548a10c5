use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdCheck {
    Valid,
    NeedsCorrection { reason: String },
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9-]+$").expect("valid id pattern"))
}

/// File stem used as the record's `file_id`.
pub fn file_id_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Participant id: everything before the first `_` of the file id.
pub fn participant_id(file_id: &str) -> String {
    file_id.split('_').next().unwrap_or_default().to_string()
}

/// Reports whether a file id yields a usable participant id. Resolution is
/// left to the caller.
pub fn check_file_id(file_id: &str) -> IdCheck {
    let id = participant_id(file_id);
    if id.is_empty() {
        return IdCheck::NeedsCorrection {
            reason: format!("'{}' has an empty id prefix", file_id),
        };
    }
    if !id_pattern().is_match(&id) {
        return IdCheck::NeedsCorrection {
            reason: format!("id '{}' contains characters outside [A-Za-z0-9-]", id),
        };
    }
    IdCheck::Valid
}
