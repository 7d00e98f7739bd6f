use crate::tree::{collect_folder_files, find_file, find_parent_folder, find_settings_folder, FileNode};

/// The aggregated reference material handed to the generation backend,
/// plus the ordered list of file names that contributed (for display).
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    pub blob: String,
    pub references: Vec<String>,
}

/// Build the context blob for the current selection.
///
/// Order matters and is part of the contract: settings library first, then
/// the actively edited file, then same-folder siblings. The reference list is
/// deduplicated in first-occurrence order. Recomputed from scratch on every
/// call; trees are author-scale, not data-scale.
pub fn assemble(tree: &[FileNode], active_id: Option<&str>) -> AssembledContext {
    fn reference(references: &mut Vec<String>, name: &str) {
        if !references.iter().any(|r| r == name) {
            references.push(name.to_string());
        }
    }

    let mut blob = String::new();
    let mut references: Vec<String> = Vec::new();

    if let Some(settings) = find_settings_folder(tree) {
        let setting_files = collect_folder_files(settings);
        if !setting_files.is_empty() {
            blob.push_str("【核心设定资料库 (必须严格遵守)】\n");
            for file in &setting_files {
                blob.push_str(&format!("--- 文件名: {} ---\n{}\n\n", file.name, file.content));
                reference(&mut references, &file.name);
            }
            blob.push_str("【设定资料结束，以上内容为绝对真理】\n\n");
        }
    }

    let active = active_id.and_then(|id| find_file(tree, id));

    if let Some(active) = active {
        if let Some(content) = active.content() {
            if !content.is_empty() {
                blob.push_str(&format!("【当前编辑文件】{}:\n{}\n\n", active.name, content));
                reference(&mut references, &active.name);
            }
        }
    }

    if let Some(active_id) = active_id {
        if let Some(parent) = find_parent_folder(tree, active_id) {
            for sibling in parent.children().unwrap_or_default() {
                if sibling.id == active_id {
                    continue;
                }
                if let Some(content) = sibling.content() {
                    if !content.is_empty() {
                        blob.push_str(&format!(
                            "【同章节/同目录参考】{}:\n{}\n\n",
                            sibling.name, content
                        ));
                        reference(&mut references, &sibling.name);
                    }
                }
            }
        }
    }

    AssembledContext { blob, references }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{FileNode, FileRole};

    fn tree_with_settings() -> Vec<FileNode> {
        vec![
            FileNode::folder(
                "settings_folder",
                "设定",
                vec![FileNode::file("chars", "人物.txt", "主角：李明。")],
            )
            .with_role(FileRole::Setting),
            FileNode::folder(
                "chapter_1",
                "第一章",
                vec![FileNode::file("prose", "正文.txt", "他走进了房间。")],
            ),
        ]
    }

    #[test]
    fn references_are_settings_then_active_in_order() {
        let tree = tree_with_settings();
        let ctx = assemble(&tree, Some("prose"));
        assert_eq!(ctx.references, vec!["人物.txt", "正文.txt"]);

        // Both labeled blocks present, settings first.
        let settings_at = ctx.blob.find("--- 文件名: 人物.txt ---").unwrap();
        let active_at = ctx.blob.find("【当前编辑文件】正文.txt").unwrap();
        assert!(settings_at < active_at);
        assert!(ctx.blob.contains("主角：李明。"));
        assert!(ctx.blob.contains("他走进了房间。"));
    }

    #[test]
    fn siblings_with_content_are_included_and_active_excluded() {
        let tree = vec![FileNode::folder(
            "chapter_1",
            "第一章",
            vec![
                FileNode::file("outline", "细纲.txt", "一、开场。"),
                FileNode::file("prose", "正文.txt", "他走进了房间。"),
                FileNode::file("empty", "空白.txt", ""),
            ],
        )];
        let ctx = assemble(&tree, Some("prose"));
        assert_eq!(ctx.references, vec!["正文.txt", "细纲.txt"]);
        assert!(ctx.blob.contains("【同章节/同目录参考】细纲.txt"));
        // Empty siblings and the active file itself contribute no sibling block.
        assert!(!ctx.blob.contains("空白.txt"));
        assert!(!ctx.blob.contains("【同章节/同目录参考】正文.txt"));
    }

    #[test]
    fn empty_active_file_is_not_referenced() {
        let tree = vec![FileNode::folder(
            "chapter_1",
            "第一章",
            vec![
                FileNode::file("outline", "细纲.txt", ""),
                FileNode::file("prose", "正文.txt", "他走进了房间。"),
            ],
        )];
        let ctx = assemble(&tree, Some("outline"));
        // Active outline is empty; only the prose sibling contributes.
        assert_eq!(ctx.references, vec!["正文.txt"]);
    }

    #[test]
    fn duplicate_names_are_referenced_once_in_first_seen_order() {
        let tree = vec![
            FileNode::folder(
                "settings_folder",
                "设定",
                vec![FileNode::file("s1", "人物.txt", "甲")],
            ),
            FileNode::folder(
                "chapter_1",
                "第一章",
                vec![
                    FileNode::file("prose", "正文.txt", "正文内容"),
                    FileNode::file("dup", "人物.txt", "乙"),
                ],
            ),
        ];
        let ctx = assemble(&tree, Some("prose"));
        assert_eq!(ctx.references, vec!["人物.txt", "正文.txt"]);
    }

    #[test]
    fn no_selection_still_exposes_settings() {
        let tree = tree_with_settings();
        let ctx = assemble(&tree, None);
        assert_eq!(ctx.references, vec!["人物.txt"]);
        assert!(ctx.blob.contains("【核心设定资料库"));
    }
}
