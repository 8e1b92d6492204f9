//! Category Aggregate
//!
//! Categories are stored with a parent link only. [`CategoryTree`] numbers
//! them as nested sets (`tree_id`, `lft`, `rght`, `level`) so that ancestor
//! and subtree questions become interval comparisons.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::Slug;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: Slug,
    pub position: i32,
}

impl Category {
    pub fn new(name: impl Into<String>, slug: Slug, parent_id: Option<Uuid>) -> Self {
        Self { id: Uuid::now_v7(), parent_id, name: name.into(), slug, position: 0 }
    }
}

/// Nested-set coordinates of a category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub tree_id: u32,
    pub lft: u32,
    pub rght: u32,
    pub level: u32,
}

impl TreeNode {
    /// `other` lies in this node's subtree, the node itself included.
    pub fn contains(&self, other: &TreeNode) -> bool {
        self.tree_id == other.tree_id && other.lft >= self.lft && other.rght <= self.rght
    }

    pub fn strictly_contains(&self, other: &TreeNode) -> bool {
        self.tree_id == other.tree_id && other.lft > self.lft && other.rght < self.rght
    }
}

#[derive(Clone, Debug, Default)]
pub struct CategoryTree {
    categories: HashMap<Uuid, Category>,
    nodes: HashMap<Uuid, TreeNode>,
    /// Category ids in depth-first (`tree_id`, `lft`) order.
    order: Vec<Uuid>,
}

impl CategoryTree {
    pub fn build(categories: Vec<Category>) -> Result<Self, CategoryError> {
        let mut children: HashMap<Option<Uuid>, Vec<&Category>> = HashMap::new();
        let ids: HashMap<Uuid, &Category> = categories.iter().map(|c| (c.id, c)).collect();
        for category in &categories {
            if let Some(parent) = category.parent_id {
                if !ids.contains_key(&parent) {
                    return Err(CategoryError::MissingParent { id: category.id, parent });
                }
            }
            children.entry(category.parent_id).or_default().push(category);
        }
        for siblings in children.values_mut() {
            siblings.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
        }

        let mut nodes = HashMap::with_capacity(categories.len());
        let mut order = Vec::with_capacity(categories.len());
        let roots = children.get(&None).cloned().unwrap_or_default();
        for (index, root) in roots.iter().enumerate() {
            let mut counter = 1;
            number_subtree(root, index as u32 + 1, 0, &children, &mut counter, &mut nodes, &mut order);
        }
        if nodes.len() != categories.len() {
            // Whatever was not reached from a root sits on a parent cycle.
            let id = categories.iter().find(|c| !nodes.contains_key(&c.id)).map(|c| c.id).unwrap_or_default();
            return Err(CategoryError::Cycle(id));
        }

        Ok(Self {
            categories: categories.into_iter().map(|c| (c.id, c)).collect(),
            nodes,
            order,
        })
    }

    pub fn get(&self, id: Uuid) -> Option<&Category> { self.categories.get(&id) }
    pub fn node(&self, id: Uuid) -> Option<&TreeNode> { self.nodes.get(&id) }
    pub fn len(&self) -> usize { self.order.len() }
    pub fn is_empty(&self) -> bool { self.order.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &Category> + '_ {
        self.order.iter().filter_map(|id| self.categories.get(id))
    }

    pub fn roots(&self) -> impl Iterator<Item = &Category> + '_ {
        self.iter().filter(|c| c.parent_id.is_none())
    }

    pub fn children(&self, id: Uuid) -> impl Iterator<Item = &Category> + '_ {
        self.iter().filter(move |c| c.parent_id == Some(id))
    }

    /// Ancestors from the root down, excluding the category itself.
    pub fn ancestors(&self, id: Uuid) -> Vec<&Category> {
        let mut path = Vec::new();
        let mut current = self.get(id).and_then(|c| c.parent_id);
        while let Some(parent) = current.and_then(|p| self.get(p)) {
            path.push(parent);
            current = parent.parent_id;
        }
        path.reverse();
        path
    }

    /// Strict descendants in tree order.
    pub fn descendants(&self, id: Uuid) -> Vec<&Category> {
        let Some(root) = self.node(id) else { return Vec::new() };
        self.iter()
            .filter(|c| self.node(c.id).is_some_and(|n| root.strictly_contains(n)))
            .collect()
    }

    /// `candidate` is `ancestor` or lies below it.
    pub fn is_in_subtree(&self, ancestor: Uuid, candidate: Uuid) -> bool {
        match (self.node(ancestor), self.node(candidate)) {
            (Some(a), Some(c)) => a.contains(c),
            _ => false,
        }
    }

    /// Slugs from the root down to `id`, inclusive.
    pub fn slug_path(&self, id: Uuid) -> Vec<&str> {
        let mut path: Vec<&str> = self.ancestors(id).into_iter().map(|c| c.slug.as_str()).collect();
        if let Some(category) = self.get(id) {
            path.push(category.slug.as_str());
        }
        path
    }

    /// Resolves a `/`-separated slug path, walking down from a root.
    pub fn find_by_path(&self, path: &[&str]) -> Option<&Category> {
        let (first, rest) = path.split_first()?;
        let mut current = self.roots().find(|c| c.slug.as_str() == *first)?;
        for slug in rest {
            current = self.children(current.id).find(|c| c.slug.as_str() == *slug)?;
        }
        Some(current)
    }
}

fn number_subtree(
    category: &Category,
    tree_id: u32,
    level: u32,
    children: &HashMap<Option<Uuid>, Vec<&Category>>,
    counter: &mut u32,
    nodes: &mut HashMap<Uuid, TreeNode>,
    order: &mut Vec<Uuid>,
) {
    let lft = *counter;
    *counter += 1;
    order.push(category.id);
    if let Some(kids) = children.get(&Some(category.id)) {
        for child in kids {
            number_subtree(child, tree_id, level + 1, children, counter, nodes, order);
        }
    }
    let rght = *counter;
    *counter += 1;
    nodes.insert(category.id, TreeNode { tree_id, lft, rght, level });
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CategoryError {
    #[error("category {id} refers to missing parent {parent}")]
    MissingParent { id: Uuid, parent: Uuid },
    #[error("category {0} is part of a parent cycle")]
    Cycle(Uuid),
}
