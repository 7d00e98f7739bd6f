/// Role a file plays in the writing workflow.
///
/// Stored explicitly on the node; `classify` keeps the legacy name-based
/// detection working for trees the author builds by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Outline,
    Prose,
    Setting,
}

impl FileRole {
    /// Infer a role from a display name (substring match on the
    /// author-facing labels).
    pub fn classify(name: &str) -> Option<Self> {
        if name.contains("细纲") || name.contains("大纲") || name.contains("总纲") {
            Some(FileRole::Outline)
        } else if name.contains("正文") {
            Some(FileRole::Prose)
        } else if name.contains("设定") {
            Some(FileRole::Setting)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    File {
        content: String,
    },
    Folder {
        children: Vec<FileNode>,
        is_open: bool,
    },
}

/// A file or folder in the project tree.
///
/// Ids are unique across the whole forest and never change after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    pub id: String,
    pub name: String,
    pub role: Option<FileRole>,
    pub kind: FileKind,
}

impl FileNode {
    pub fn file(id: &str, name: &str, content: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            role: None,
            kind: FileKind::File {
                content: content.to_string(),
            },
        }
    }

    pub fn folder(id: &str, name: &str, children: Vec<FileNode>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            role: None,
            kind: FileKind::Folder {
                children,
                is_open: true,
            },
        }
    }

    pub fn with_role(mut self, role: FileRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, FileKind::File { .. })
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, FileKind::Folder { .. })
    }

    pub fn content(&self) -> Option<&str> {
        match &self.kind {
            FileKind::File { content } => Some(content),
            FileKind::Folder { .. } => None,
        }
    }

    pub fn children(&self) -> Option<&[FileNode]> {
        match &self.kind {
            FileKind::Folder { children, .. } => Some(children),
            FileKind::File { .. } => None,
        }
    }

    pub fn is_open(&self) -> bool {
        match &self.kind {
            FileKind::Folder { is_open, .. } => *is_open,
            FileKind::File { .. } => false,
        }
    }

    /// Effective role: the explicit tag wins, otherwise fall back to
    /// name-based classification.
    pub fn effective_role(&self) -> Option<FileRole> {
        self.role.or_else(|| FileRole::classify(&self.name))
    }
}

/// A flattened file entry produced by `collect_folder_files`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderFile {
    pub name: String,
    pub content: String,
}

/// Depth-first search for a node by id, at any depth.
pub fn find_file<'a>(nodes: &'a [FileNode], id: &str) -> Option<&'a FileNode> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(children) = node.children() {
            if let Some(found) = find_file(children, id) {
                return Some(found);
            }
        }
    }
    None
}

/// Depth-first search for the folder whose direct children contain `child_id`.
pub fn find_parent_folder<'a>(nodes: &'a [FileNode], child_id: &str) -> Option<&'a FileNode> {
    for node in nodes {
        if let Some(children) = node.children() {
            if children.iter().any(|child| child.id == child_id) {
                return Some(node);
            }
            if let Some(found) = find_parent_folder(children, child_id) {
                return Some(found);
            }
        }
    }
    None
}

/// Rebuild the tree with the content of the file matching `id` replaced.
///
/// A missing id (or an id naming a folder) leaves the tree structurally
/// unchanged; stale ids from async callbacks must not fail.
pub fn update_content(nodes: Vec<FileNode>, id: &str, new_content: &str) -> Vec<FileNode> {
    nodes
        .into_iter()
        .map(|mut node| {
            match &mut node.kind {
                FileKind::File { content } if node.id == id => {
                    *content = new_content.to_string();
                }
                FileKind::Folder { children, .. } => {
                    let taken = std::mem::take(children);
                    *children = update_content(taken, id, new_content);
                }
                FileKind::File { .. } => {}
            }
            node
        })
        .collect()
}

/// Rebuild the tree with the expansion flag of the folder matching `id`
/// flipped. No-op for missing ids and for file nodes.
pub fn toggle_folder(nodes: Vec<FileNode>, id: &str) -> Vec<FileNode> {
    nodes
        .into_iter()
        .map(|mut node| {
            if let FileKind::Folder { children, is_open } = &mut node.kind {
                if node.id == id {
                    *is_open = !*is_open;
                } else {
                    let taken = std::mem::take(children);
                    *children = toggle_folder(taken, id);
                }
            }
            node
        })
        .collect()
}

/// Flatten all file descendants of a folder, depth-first, preserving child
/// order. Folders contribute no entry of their own.
pub fn collect_folder_files(folder: &FileNode) -> Vec<FolderFile> {
    let mut results = Vec::new();
    if let Some(children) = folder.children() {
        for child in children {
            match &child.kind {
                FileKind::File { content } => {
                    results.push(FolderFile {
                        name: child.name.clone(),
                        content: content.clone(),
                    });
                }
                FileKind::Folder { .. } => {
                    results.extend(collect_folder_files(child));
                }
            }
        }
    }
    results
}

/// Locate the settings/reference folder: first folder (depth-first) tagged or
/// named as a setting collection, with the legacy `settings_folder` id as a
/// compatibility match.
pub fn find_settings_folder(nodes: &[FileNode]) -> Option<&FileNode> {
    for node in nodes {
        if node.is_folder() {
            if node.id == "settings_folder" || node.effective_role() == Some(FileRole::Setting) {
                return Some(node);
            }
            if let Some(children) = node.children() {
                if let Some(found) = find_settings_folder(children) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// The seeded demo project a fresh session starts from.
pub fn starter_project() -> Vec<FileNode> {
    vec![
        FileNode::folder(
            "settings_folder",
            "设定",
            vec![
                FileNode::file(
                    "setting_characters",
                    "人物.txt",
                    "主角：李明，三十岁，城市考古队队员。沉默寡言，对旧物有执念。\n配角：赵雨，李明的搭档，话多，负责对外交涉。\n",
                ),
                FileNode::file(
                    "setting_world",
                    "世界观.txt",
                    "近未来的滨海城市。旧城区在二十年前的地陷后被封锁，传闻地下仍有人居住。\n",
                ),
            ],
        )
        .with_role(FileRole::Setting),
        FileNode::file(
            "macro_outline",
            "总纲.txt",
            "第一卷：李明进入封锁区，寻找失踪的父亲留下的线索。\n",
        )
        .with_role(FileRole::Outline),
        FileNode::folder(
            "chapter_1",
            "第一章",
            vec![
                FileNode::file("chapter_1_outline", "细纲.txt", "").with_role(FileRole::Outline),
                FileNode::file("chapter_1_prose", "正文.txt", "").with_role(FileRole::Prose),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Vec<FileNode> {
        vec![
            FileNode::folder(
                "root",
                "第一章",
                vec![
                    FileNode::file("outline", "细纲.txt", ""),
                    FileNode::file("prose", "正文.txt", "他走进了房间。"),
                    FileNode::folder(
                        "notes",
                        "备注",
                        vec![FileNode::file("note_1", "备注一.txt", "一些备注")],
                    ),
                ],
            ),
            FileNode::file("loose", "散页.txt", "散落的片段"),
        ]
    }

    #[test]
    fn find_file_searches_all_depths() {
        let tree = sample_tree();
        assert_eq!(find_file(&tree, "note_1").unwrap().name, "备注一.txt");
        assert_eq!(find_file(&tree, "loose").unwrap().name, "散页.txt");
        assert!(find_file(&tree, "missing").is_none());
    }

    #[test]
    fn find_parent_folder_returns_direct_parent() {
        let tree = sample_tree();
        assert_eq!(find_parent_folder(&tree, "prose").unwrap().id, "root");
        assert_eq!(find_parent_folder(&tree, "note_1").unwrap().id, "notes");
        // Top-level nodes have no parent.
        assert!(find_parent_folder(&tree, "loose").is_none());
    }

    #[test]
    fn update_content_round_trips_through_find() {
        let tree = sample_tree();
        let updated = update_content(tree, "outline", "场景：房间。");
        assert_eq!(
            find_file(&updated, "outline").unwrap().content(),
            Some("场景：房间。")
        );
    }

    #[test]
    fn update_content_missing_id_is_structural_noop() {
        let tree = sample_tree();
        let updated = update_content(tree.clone(), "missing", "新内容");
        assert_eq!(updated, tree);
    }

    #[test]
    fn update_content_ignores_folder_ids() {
        let tree = sample_tree();
        let updated = update_content(tree.clone(), "notes", "不应写入");
        assert_eq!(updated, tree);
    }

    #[test]
    fn toggle_folder_twice_restores_tree() {
        let tree = sample_tree();
        let toggled = toggle_folder(toggle_folder(tree.clone(), "notes"), "notes");
        assert_eq!(toggled, tree);
    }

    #[test]
    fn toggle_folder_flips_only_the_target() {
        let tree = sample_tree();
        let toggled = toggle_folder(tree, "notes");
        assert!(!find_file(&toggled, "notes").unwrap().is_open());
        assert!(find_file(&toggled, "root").unwrap().is_open());
    }

    #[test]
    fn collect_folder_files_is_depth_first_and_files_only() {
        let tree = sample_tree();
        let root = find_file(&tree, "root").unwrap();
        let files = collect_folder_files(root);
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["细纲.txt", "正文.txt", "备注一.txt"]);
    }

    #[test]
    fn collect_folder_files_counts_every_reachable_file() {
        let tree = sample_tree();
        let root = find_file(&tree, "root").unwrap();
        // Three file nodes reachable from "root", one nested one level down.
        assert_eq!(collect_folder_files(root).len(), 3);
    }

    #[test]
    fn role_tag_wins_over_name() {
        let node = FileNode::file("f", "正文.txt", "").with_role(FileRole::Outline);
        assert_eq!(node.effective_role(), Some(FileRole::Outline));
    }

    #[test]
    fn role_falls_back_to_name_classification() {
        assert_eq!(FileRole::classify("第三章细纲.txt"), Some(FileRole::Outline));
        assert_eq!(FileRole::classify("大纲v2.txt"), Some(FileRole::Outline));
        assert_eq!(FileRole::classify("正文.txt"), Some(FileRole::Prose));
        assert_eq!(FileRole::classify("设定集.txt"), Some(FileRole::Setting));
        assert_eq!(FileRole::classify("随笔.txt"), None);
    }

    #[test]
    fn settings_folder_found_by_id_or_role_or_name() {
        let by_id = vec![FileNode::folder("settings_folder", "资料", vec![])];
        assert!(find_settings_folder(&by_id).is_some());

        let by_role =
            vec![FileNode::folder("refs", "资料", vec![]).with_role(FileRole::Setting)];
        assert!(find_settings_folder(&by_role).is_some());

        let by_name = vec![FileNode::folder("refs", "设定", vec![])];
        assert!(find_settings_folder(&by_name).is_some());

        let none = vec![FileNode::folder("refs", "资料", vec![])];
        assert!(find_settings_folder(&none).is_none());
    }

    #[test]
    fn starter_project_ids_are_unique() {
        fn walk(nodes: &[FileNode], ids: &mut Vec<String>) {
            for node in nodes {
                ids.push(node.id.clone());
                if let Some(children) = node.children() {
                    walk(children, ids);
                }
            }
        }
        let tree = starter_project();
        let mut ids = Vec::new();
        walk(&tree, &mut ids);
        let mut deduped = ids.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(ids.len(), deduped.len());
    }
}
