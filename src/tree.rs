//! File tree construction for the studio explorer.
//!
//! The tree is derived data: it is rebuilt wholesale from the generated file
//! list and never mutated incrementally.

use crate::generate::GeneratedFile;
use serde::{Deserialize, Serialize};

/// Display name of the synthesized root folder.
pub const ROOT_NAME: &str = "my-app";

/// Whether a tree node is a folder or a file leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    File,
}

/// One node of the explorer tree.
///
/// Folders always carry a `children` list; file leaves never do. The wire
/// format uses `type` for the kind discriminant to match the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTreeNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileTreeNode>>,
}

impl FileTreeNode {
    fn folder(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: NodeKind::Folder,
            path: path.to_string(),
            children: Some(Vec::new()),
        }
    }

    fn file(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: NodeKind::File,
            path: path.to_string(),
            children: None,
        }
    }
}

/// Build an explorer tree from a flat list of generated files.
///
/// Pure function. Children follow first-seen order of the input paths, with
/// intermediate folders created on demand and deduplicated by name. Empty
/// path segments are ignored; a duplicate file leaf keeps its first
/// occurrence.
pub fn build_tree(files: &[GeneratedFile]) -> FileTreeNode {
    let mut root = FileTreeNode::folder(ROOT_NAME, "/");
    for file in files {
        insert_path(&mut root, &file.path);
    }
    root
}

fn insert_path(root: &mut FileTreeNode, path: &str) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return;
    }

    let mut current = root;
    let mut prefix = String::new();
    let last = segments.len() - 1;

    for (depth, segment) in segments.iter().enumerate() {
        prefix.push('/');
        prefix.push_str(segment);

        let children = current.children.get_or_insert_with(Vec::new);
        let index = match children.iter().position(|child| child.name == *segment) {
            Some(index) => {
                if depth == last {
                    // First occurrence of a leaf wins
                    return;
                }
                index
            }
            None => {
                let node = if depth == last {
                    FileTreeNode::file(segment, &prefix)
                } else {
                    FileTreeNode::folder(segment, &prefix)
                };
                children.push(node);
                children.len() - 1
            }
        };

        if depth == last {
            return;
        }
        current = &mut children[index];
    }
}
