use similar::{ChangeTag, TextDiff};

/// Agent-generated content staged against one specific file.
///
/// The target id travels with the proposal, so a pending preview survives
/// selection changes and accept/reject always land on the file it was staged
/// for. At most one proposal exists system-wide (`Option<PendingPreview>` on
/// the App).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPreview {
    pub file_id: String,
    pub proposed: String,
}

impl PendingPreview {
    pub fn new(file_id: &str, proposed: String) -> Self {
        Self {
            file_id: file_id.to_string(),
            proposed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Unchanged,
    Added,
    Removed,
}

/// One display line of the comparison view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRow {
    pub kind: DiffKind,
    pub text: String,
}

/// Line diff of the proposal against the file's current content, in document
/// order. Display-only: committing a proposal always replaces the content
/// wholesale, never applies a patch.
pub fn diff_rows(current: &str, proposed: &str) -> Vec<DiffRow> {
    let diff = TextDiff::from_lines(current, proposed);
    diff.iter_all_changes()
        .map(|change| {
            let kind = match change.tag() {
                ChangeTag::Equal => DiffKind::Unchanged,
                ChangeTag::Insert => DiffKind::Added,
                ChangeTag::Delete => DiffKind::Removed,
            };
            DiffRow {
                kind,
                text: change.value().trim_end_matches('\n').to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_addition_against_empty_content() {
        let rows = diff_rows("", "场景：房间。\n冲突：无。\n");
        assert!(rows.iter().all(|r| r.kind == DiffKind::Added));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text, "场景：房间。");
    }

    #[test]
    fn changed_line_shows_removed_then_added() {
        let rows = diff_rows("第一行\n第二行\n", "第一行\n第二行改\n");
        assert_eq!(rows[0].kind, DiffKind::Unchanged);
        let kinds: Vec<DiffKind> = rows[1..].iter().map(|r| r.kind).collect();
        assert!(kinds.contains(&DiffKind::Removed));
        assert!(kinds.contains(&DiffKind::Added));
    }

    #[test]
    fn identical_content_is_all_unchanged() {
        let rows = diff_rows("一样\n", "一样\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, DiffKind::Unchanged);
    }

    #[test]
    fn rows_preserve_document_order() {
        let rows = diff_rows("甲\n乙\n", "甲\n丙\n乙\n");
        let texts: Vec<&str> = rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["甲", "丙", "乙"]);
    }
}
