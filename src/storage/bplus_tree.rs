use crate::{
    storage::{
        allocator::{alloc_page, free_page},
        context::DbContext,
        index_node::{IndexNode, MAX_NODE_ENTRIES},
    },
    types::{
        PageNumber,
        entry::{IndexEntry, exact_index, floor_index, route_index},
        error::{DatabaseError, Result},
    },
};

/// Default fanout: nodes split once they hold more than this many entries.
pub const MAX_DEGREE: usize = 320;

/// A node on the descent path and the slot that was followed out of it.
struct PathStep {
    node: IndexNode,
    slot: usize,
}

/// B+tree from `i64` keys to page numbers, stored as index node pages
/// resolved through the session's transaction.
///
/// Internal entries carry the minimum key of the subtree they point to. The
/// root page number only changes when the tree goes from empty to non-empty
/// or back: root splits and collapses rewrite the root page in place.
pub struct BPlusTree {
    ctx: DbContext,
    root: PageNumber,
    max_degree: usize,
}

impl BPlusTree {
    /// An empty tree; the root page is allocated by the first insert.
    pub fn new(ctx: DbContext) -> Self {
        Self::open(ctx, 0)
    }

    pub fn open(ctx: DbContext, root: PageNumber) -> Self {
        Self {
            ctx,
            root,
            max_degree: MAX_DEGREE,
        }
    }

    /// Overrides the fanout. A tree must always be reopened with the fanout
    /// it was built with.
    pub fn with_max_degree(mut self, max_degree: usize) -> Result<Self> {
        if !(4..MAX_NODE_ENTRIES).contains(&max_degree) {
            return Err(DatabaseError::InvalidConfig {
                reason: format!(
                    "B+tree fanout must be between 4 and {}, got {}",
                    MAX_NODE_ENTRIES - 1,
                    max_degree
                ),
            });
        }
        self.max_degree = max_degree;
        Ok(self)
    }

    pub fn root_page_number(&self) -> PageNumber {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root == 0
    }

    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    pub fn min_degree(&self) -> usize {
        self.max_degree / 2
    }

    fn load(&self, page_number: PageNumber) -> Result<IndexNode> {
        IndexNode::from_bytes(page_number, &self.ctx.read_page(page_number)?)
    }

    fn save(&self, node: &IndexNode) -> Result<()> {
        self.ctx.write_page(node.page_number, node.to_bytes()?)
    }

    /// Root-to-leaf path towards `key`, following the floor entry at each
    /// internal node.
    fn descend(&self, key: i64) -> Result<Vec<PathStep>> {
        if self.root == 0 {
            return Err(DatabaseError::Empty);
        }
        let mut path = Vec::new();
        let mut node = self.load(self.root)?;
        loop {
            let slot = route_index(&node.entries, key);
            if node.is_leaf() {
                path.push(PathStep { node, slot });
                return Ok(path);
            }
            let child = node
                .entries
                .get(slot)
                .map(|e| e.page_number)
                .ok_or_else(|| DatabaseError::CorruptedPage {
                    page_number: node.page_number,
                    reason: "internal index node without entries".to_string(),
                })?;
            path.push(PathStep { node, slot });
            node = self.load(child)?;
        }
    }

    fn leaf_for(&self, key: i64) -> Result<IndexNode> {
        let mut path = self.descend(key)?;
        path.pop()
            .map(|step| step.node)
            .ok_or(DatabaseError::Empty)
    }

    /// Page stored under exactly `key`.
    pub fn search(&self, key: i64) -> Result<PageNumber> {
        self.search_all(key).map(|entry| entry.page_number)
    }

    /// Entry stored under exactly `key`.
    pub fn search_all(&self, key: i64) -> Result<IndexEntry> {
        if self.root == 0 {
            return Err(DatabaseError::NotFound);
        }
        let leaf = self.leaf_for(key)?;
        exact_index(&leaf.entries, key)
            .map(|i| leaf.entries[i])
            .ok_or(DatabaseError::NotFound)
    }

    /// Entry with the greatest key not above `key`.
    pub fn search_floor(&self, key: i64) -> Result<IndexEntry> {
        if self.root == 0 {
            return Err(DatabaseError::NotFound);
        }
        let leaf = self.leaf_for(key)?;
        floor_index(&leaf.entries, key)
            .map(|i| leaf.entries[i])
            .ok_or(DatabaseError::NotFound)
    }

    pub fn insert(&mut self, key: i64, page_number: PageNumber) -> Result<()> {
        self.ctx.require_write("index insert");
        if self.root == 0 {
            let root = alloc_page(&self.ctx)?;
            let mut node = IndexNode::new_leaf(root);
            node.entries.push(IndexEntry::new(key, page_number));
            self.save(&node)?;
            self.root = root;
            tracing::debug!("index root created at page {}", root);
            return Ok(());
        }

        let mut path = self.descend(key)?;
        let Some(leaf) = path.last_mut() else {
            return Err(DatabaseError::Empty);
        };
        let position = leaf.node.entries.partition_point(|e| e.key < key);
        if leaf.node.entries.get(position).is_some_and(|e| e.key == key) {
            return Err(DatabaseError::Overlapped);
        }
        leaf.node
            .entries
            .insert(position, IndexEntry::new(key, page_number));

        for level in (0..path.len()).rev() {
            let (upper, lower) = path.split_at_mut(level);
            let node = &mut lower[0].node;
            if level == 0 {
                if node.len() > self.max_degree {
                    self.split_root(node)?;
                } else {
                    self.save(node)?;
                }
                break;
            }

            let parent = &mut upper[level - 1];
            if node.len() > self.max_degree {
                self.split_child(&mut parent.node, parent.slot, node)?;
            } else {
                self.save(node)?;
            }
            if let Some(min) = node.min_key() {
                parent.node.entries[parent.slot].key = min;
            }
        }
        Ok(())
    }

    /// Moves the upper half of `node` into a new right sibling and gives
    /// `parent` a routing entry for it right after `slot`.
    fn split_child(&self, parent: &mut IndexNode, slot: usize, node: &mut IndexNode) -> Result<()> {
        let right_page = alloc_page(&self.ctx)?;
        let mid = node.len() / 2;
        let right = IndexNode {
            page_number: right_page,
            entries: node.entries.split_off(mid),
            prev: node.page_number,
            next: node.next,
            internal: node.internal,
        };
        if node.next != 0 {
            let mut after = self.load(node.next)?;
            after.prev = right_page;
            self.save(&after)?;
        }
        node.next = right_page;
        self.save(node)?;
        self.save(&right)?;

        parent
            .entries
            .insert(slot + 1, IndexEntry::new(right.entries[0].key, right_page));
        tracing::debug!(
            "split index node {} into {} ({} / {} entries)",
            node.page_number,
            right_page,
            node.len(),
            right.len()
        );
        Ok(())
    }

    /// Grows the tree by one level. The root's entries move into a new child
    /// which is then split; the root page keeps its number.
    fn split_root(&self, root: &mut IndexNode) -> Result<()> {
        let child_page = alloc_page(&self.ctx)?;
        let mut child = IndexNode {
            page_number: child_page,
            entries: std::mem::take(&mut root.entries),
            prev: 0,
            next: 0,
            internal: root.internal,
        };
        root.internal = true;
        root.entries
            .push(IndexEntry::new(child.entries[0].key, child_page));
        self.split_child(root, 0, &mut child)?;
        self.save(root)?;
        tracing::debug!("index root {} split, height grows", root.page_number);
        Ok(())
    }

    pub fn remove(&mut self, key: i64) -> Result<()> {
        self.ctx.require_write("index remove");
        if self.root == 0 {
            return Err(DatabaseError::NotFound);
        }
        let mut path = self.descend(key)?;
        let Some(leaf) = path.last_mut() else {
            return Err(DatabaseError::Empty);
        };
        let position = exact_index(&leaf.node.entries, key).ok_or(DatabaseError::NotFound)?;
        leaf.node.entries.remove(position);

        for level in (1..path.len()).rev() {
            let (upper, lower) = path.split_at_mut(level);
            let parent = &mut upper[level - 1];
            let node = &mut lower[0].node;
            if node.len() < self.min_degree() {
                self.fix_underflow(&mut parent.node, parent.slot, node)?;
            } else {
                self.save(node)?;
                if let Some(min) = node.min_key() {
                    parent.node.entries[parent.slot].key = min;
                }
            }
        }

        let root = &mut path[0].node;
        if root.internal && root.len() == 1 {
            let child_page = root.entries[0].page_number;
            let child = self.load(child_page)?;
            root.entries = child.entries;
            root.internal = child.internal;
            self.save(root)?;
            free_page(&self.ctx, child_page)?;
            tracing::debug!("index root {} collapsed, height shrinks", root.page_number);
        } else if root.is_leaf() && root.is_empty() {
            free_page(&self.ctx, root.page_number)?;
            tracing::debug!("index root {} freed, tree is empty", root.page_number);
            self.root = 0;
        } else {
            self.save(root)?;
        }
        Ok(())
    }

    /// Restores the minimum fill of `node` (at `slot` under `parent`) by
    /// borrowing from a sibling that can spare an entry, or by merging with
    /// the larger sibling.
    fn fix_underflow(&self, parent: &mut IndexNode, slot: usize, node: &mut IndexNode) -> Result<()> {
        let left = match slot.checked_sub(1) {
            Some(i) => Some(self.load(parent.entries[i].page_number)?),
            None => None,
        };
        let right = match parent.entries.get(slot + 1) {
            Some(entry) => Some(self.load(entry.page_number)?),
            None => None,
        };
        let left_len = left.as_ref().map_or(0, IndexNode::len);
        let right_len = right.as_ref().map_or(0, IndexNode::len);
        let prefer_left = left.is_some() && (right.is_none() || left_len > right_len);

        let min = self.min_degree();
        let lend_from_left = match (left_len > min, right_len > min) {
            (true, true) => Some(prefer_left),
            (true, false) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        };

        match (lend_from_left, prefer_left, left, right) {
            (Some(true), _, Some(mut left), _) => {
                if let Some(moved) = left.entries.pop() {
                    node.entries.insert(0, moved);
                }
                self.save(&left)?;
                self.save(node)?;
                parent.entries[slot].key = node.entries[0].key;
            }
            (Some(false), _, _, Some(mut right)) => {
                let moved = right.entries.remove(0);
                node.entries.push(moved);
                self.save(&right)?;
                self.save(node)?;
                parent.entries[slot + 1].key = right.entries[0].key;
                parent.entries[slot].key = node.entries[0].key;
            }
            (None, true, Some(mut left), _) => {
                left.entries.append(&mut node.entries);
                left.next = node.next;
                self.relink_prev(node.next, left.page_number)?;
                self.save(&left)?;
                free_page(&self.ctx, node.page_number)?;
                parent.entries.remove(slot);
                tracing::debug!("merged index node {} into {}", node.page_number, left.page_number);
            }
            (None, false, _, Some(right)) => {
                node.entries.extend(right.entries);
                node.next = right.next;
                self.relink_prev(right.next, node.page_number)?;
                self.save(node)?;
                free_page(&self.ctx, right.page_number)?;
                parent.entries.remove(slot + 1);
                if let Some(min) = node.min_key() {
                    parent.entries[slot].key = min;
                }
                tracing::debug!("merged index node {} into {}", right.page_number, node.page_number);
            }
            _ => panic!(
                "index node {} underflowed with no sibling under {}",
                node.page_number, parent.page_number
            ),
        }
        Ok(())
    }

    fn relink_prev(&self, page_number: PageNumber, prev: PageNumber) -> Result<()> {
        if page_number == 0 {
            return Ok(());
        }
        let mut node = self.load(page_number)?;
        node.prev = prev;
        self.save(&node)
    }

    /// Levels from the root down; 0 for an empty tree.
    pub fn height(&self) -> Result<usize> {
        if self.root == 0 {
            return Ok(0);
        }
        let mut height = 1;
        let mut node = self.load(self.root)?;
        while node.internal {
            let first = node.entries.first().ok_or(DatabaseError::Empty)?;
            node = self.load(first.page_number)?;
            height += 1;
        }
        Ok(height)
    }

    /// Entry counts of every node, level by level from the root.
    pub fn level_sizes(&self) -> Result<Vec<Vec<usize>>> {
        let mut levels = Vec::new();
        if self.root == 0 {
            return Ok(levels);
        }
        let mut current = vec![self.load(self.root)?];
        while !current.is_empty() {
            levels.push(current.iter().map(IndexNode::len).collect());
            let mut next = Vec::new();
            for node in current.iter().filter(|n| n.internal) {
                for entry in &node.entries {
                    next.push(self.load(entry.page_number)?);
                }
            }
            current = next;
        }
        Ok(levels)
    }

    /// Every leaf entry, read by walking the leaf sibling chain.
    pub fn leaf_entries(&self) -> Result<Vec<IndexEntry>> {
        let mut entries = Vec::new();
        if self.root == 0 {
            return Ok(entries);
        }
        let mut node = self.load(self.root)?;
        while node.internal {
            let first = node.entries.first().ok_or(DatabaseError::Empty)?;
            node = self.load(first.page_number)?;
        }
        loop {
            entries.extend_from_slice(&node.entries);
            if node.next == 0 {
                return Ok(entries);
            }
            node = self.load(node.next)?;
        }
    }
}
