use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

const WILDCARD: &str = "*";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("path must not be empty")]
    EmptyPath,

    #[error("path must not contain an empty segment: {0}")]
    EmptySegment(String),

    #[error("duplicate route: {0}")]
    DuplicateRoute(String),

    #[error("conflicting wildcard name at segment {segment}: ':{existing}' is already registered, cannot bind ':{requested}'")]
    WildcardConflict {
        segment: usize,
        existing: String,
        requested: String,
    },

    #[error("route not found: {0}")]
    RouteNotFound(String),
}

/// Successful match: the dataset id bound to the path plus captured
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub dataset_id: String,
    pub params: HashMap<String, String>,
}

/// One registered route, for inspection endpoints.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RouteEntry {
    pub path: String,
    pub dataset_id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
struct Node {
    /// Literal segment text, or `*` for the wildcard slot.
    id: String,
    /// Capture name when this node is the wildcard slot.
    name: String,
    /// Accumulated full path, set once a handle is installed.
    path: String,
    /// Bound dataset id.
    handle: Option<String>,
    children: Vec<Node>,
}

impl Node {
    fn child_index(&self, id: &str) -> Option<usize> {
        self.children.iter().position(|c| c.id == id)
    }
}

/// Immutable-once-published path trie.
#[derive(Debug, Default)]
pub struct PathTrie {
    root: Node,
}

impl PathTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path. `:name` segments become named captures. Registering
    /// an already-occupied full path is an error, as is a capture name that
    /// conflicts with an existing wildcard at the same level.
    pub fn add(&mut self, path: &str, dataset_id: &str) -> Result<(), RouterError> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        if trimmed.is_empty() {
            return Err(RouterError::EmptyPath);
        }

        let mut node = &mut self.root;
        for (depth, segment) in trimmed.split('/').enumerate() {
            if segment.is_empty() {
                return Err(RouterError::EmptySegment(path.to_string()));
            }
            let (id, name) = match segment.strip_prefix(':') {
                Some(capture) => (WILDCARD, capture),
                None => (segment, segment),
            };

            if id == WILDCARD {
                if let Some(idx) = node.child_index(WILDCARD) {
                    let existing = &node.children[idx].name;
                    if existing != name {
                        return Err(RouterError::WildcardConflict {
                            segment: depth,
                            existing: existing.clone(),
                            requested: name.to_string(),
                        });
                    }
                }
            }

            let idx = match node.child_index(id) {
                Some(idx) => idx,
                None => {
                    node.children.push(Node {
                        id: id.to_string(),
                        name: name.to_string(),
                        ..Node::default()
                    });
                    node.children.len() - 1
                }
            };
            node = &mut node.children[idx];
        }

        if node.handle.is_some() {
            return Err(RouterError::DuplicateRoute(path.to_string()));
        }
        node.path = trimmed.to_string();
        node.handle = Some(dataset_id.to_string());
        Ok(())
    }

    /// Unbind a path. Clears the handle only; the subtree is not pruned.
    pub fn remove(&mut self, path: &str) -> Result<(), RouterError> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        if trimmed.is_empty() {
            return Err(RouterError::EmptyPath);
        }

        let mut node = &mut self.root;
        for segment in trimmed.split('/') {
            let id = if segment.starts_with(':') { WILDCARD } else { segment };
            match node.child_index(id) {
                Some(idx) => node = &mut node.children[idx],
                None => return Err(RouterError::RouteNotFound(path.to_string())),
            }
        }
        if node.handle.take().is_none() {
            return Err(RouterError::RouteNotFound(path.to_string()));
        }
        node.path.clear();
        Ok(())
    }

    /// Match an inbound path. At every level an exact literal child wins
    /// over the wildcard slot. A dead-end is a plain `None`, not an error.
    pub fn match_path(&self, path: &str) -> Option<RouteMatch> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        if trimmed.is_empty() {
            return None;
        }

        let mut node = &self.root;
        let mut params = HashMap::new();
        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return None;
            }
            if let Some(idx) = node.child_index(segment) {
                node = &node.children[idx];
            } else if let Some(idx) = node.child_index(WILDCARD) {
                node = &node.children[idx];
                params.insert(node.name.clone(), segment.to_string());
            } else {
                return None;
            }
        }

        node.handle.as_ref().map(|dataset_id| RouteMatch {
            dataset_id: dataset_id.clone(),
            params,
        })
    }

    /// All bound routes, depth-first.
    pub fn routes(&self) -> Vec<RouteEntry> {
        let mut out = Vec::new();
        collect(&self.root, &mut out);
        out
    }

    pub fn len(&self) -> usize {
        self.routes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes().is_empty()
    }
}

fn collect(node: &Node, out: &mut Vec<RouteEntry>) {
    if let Some(dataset_id) = &node.handle {
        out.push(RouteEntry {
            path: node.path.clone(),
            dataset_id: dataset_id.clone(),
        });
    }
    for child in &node.children {
        collect(child, out);
    }
}
