use crate::{
    builder::{EntryKind, PlannedEntry},
    utils::normalize_path,
};
use colored::Colorize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Represents a node in the tree (either file or directory).
#[derive(Debug)]
struct TreeNode {
    name: String,
    children: Vec<Rc<RefCell<TreeNode>>>,
    is_file: bool,
}
impl TreeNode {
    fn new(name: String, is_file: bool) -> Self {
        Self {
            name,
            children: Vec::new(),
            is_file,
        }
    }
}

/// Build the directory tree from planned entries, returning the root node.
///
/// Parents that were never queued explicitly (for example `a` in `a/b.txt`) are added as
/// directories so every entry has a place to hang from.
fn build_tree(entries: &[PlannedEntry], label: &str) -> Rc<RefCell<TreeNode>> {
    let root = Rc::new(RefCell::new(TreeNode::new(label.to_string(), false)));

    // map relative path to node
    let mut lookup: HashMap<PathBuf, Rc<RefCell<TreeNode>>> = HashMap::new();
    lookup.insert(PathBuf::new(), Rc::clone(&root));

    for entry in entries {
        let path = normalize_path(&entry.path);
        if path.as_os_str().is_empty() {
            // the root itself
            continue;
        }
        let parent = ensure_parent(&mut lookup, path.parent().unwrap_or(Path::new("")));

        if let Some(existing) = lookup.get(&path) {
            // a directory created implicitly earlier, now queued for real
            existing.borrow_mut().is_file = entry.kind != EntryKind::Directory;
            continue;
        }

        let name = path
            .file_name()
            .map(|os| os.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let node = Rc::new(RefCell::new(TreeNode::new(
            name,
            entry.kind != EntryKind::Directory,
        )));

        parent.borrow_mut().children.push(Rc::clone(&node));
        lookup.insert(path, node);
    }

    root
}

fn ensure_parent(
    lookup: &mut HashMap<PathBuf, Rc<RefCell<TreeNode>>>,
    path: &Path,
) -> Rc<RefCell<TreeNode>> {
    if let Some(node) = lookup.get(path) {
        return Rc::clone(node);
    }

    log::debug!("implicit parent: {}", path.display());

    let grand_parent = ensure_parent(lookup, path.parent().unwrap_or(Path::new("")));
    let name = path
        .file_name()
        .map(|os| os.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let node = Rc::new(RefCell::new(TreeNode::new(name, false)));

    grand_parent.borrow_mut().children.push(Rc::clone(&node));
    lookup.insert(path.to_path_buf(), Rc::clone(&node));

    node
}

/// Print the tree with a nice ASCII style.
fn print_tree(out: &mut String, node: &Rc<RefCell<TreeNode>>, prefix: &str, is_last: bool) {
    let node_borrow = node.borrow();

    let connector = if is_last {
        "└── ".yellow()
    } else {
        "├── ".yellow()
    };
    let name = if node_borrow.is_file {
        node_borrow.name.green()
    } else {
        node_borrow.name.blue()
    };
    let _ = writeln!(out, "{}{}{}", prefix.yellow(), connector, name);

    let child_prefix = if is_last {
        format!("{}    ", prefix)
    } else {
        format!("{}│   ", prefix)
    };

    let len = node_borrow.children.len();
    for (i, child) in node_borrow.children.iter().enumerate() {
        let last = i == len - 1;
        print_tree(out, child, &child_prefix, last);
    }
}

/// Renders `entries` under a root labelled `label`. Directories are blue, files green.
pub fn render_tree(entries: &[PlannedEntry], label: &str) -> String {
    let tree_root = build_tree(entries, label);

    let mut out = String::new();
    print_tree(&mut out, &tree_root, "", true);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, kind: EntryKind) -> PlannedEntry {
        PlannedEntry {
            path: PathBuf::from(path),
            kind,
        }
    }

    #[test]
    fn test_render_tree_plain() {
        colored::control::set_override(false);

        let rendered = render_tree(
            &[
                entry("src", EntryKind::Directory),
                entry("src/lib.rs", EntryKind::File),
                entry("README.md", EntryKind::File),
            ],
            "demo",
        );

        assert_eq!(
            rendered,
            "└── demo\n    ├── src\n    │   └── lib.rs\n    └── README.md\n"
        );
    }

    #[test]
    fn test_render_tree_adds_implicit_parents() {
        colored::control::set_override(false);

        let rendered = render_tree(
            &[
                entry("a/b/c.txt", EntryKind::File),
                entry("./a/b", EntryKind::Directory),
            ],
            ".",
        );

        assert_eq!(
            rendered,
            "└── .\n    └── a\n        └── b\n            └── c.txt\n"
        );
    }

    #[test]
    fn test_render_tree_ignores_entries_naming_the_root() {
        colored::control::set_override(false);
        let entries = [
            entry(".", EntryKind::File),
            entry("a/..", EntryKind::File),
            entry("b", EntryKind::Directory),
        ];

        let root = build_tree(&entries, "root");
        assert!(!root.borrow().is_file);
        assert_eq!(root.borrow().children.len(), 1);

        assert_eq!(render_tree(&entries, "root"), "└── root\n    └── b\n");
    }
}
