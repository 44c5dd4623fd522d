/// Disjoint-set forest over the dense indexes `0..len`.
///
/// Each slot holds the index of its parent; roots point at themselves.
pub struct Forest {
    parent: Vec<usize>,
}

impl Forest {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Root of the tree containing `node`.
    ///
    /// Every node visited on the way is rewired to point directly at the root.
    pub fn find(&mut self, node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut idx = node;
        while self.parent[idx] != root {
            let next = self.parent[idx];
            self.parent[idx] = root;
            idx = next;
        }

        root
    }

    /// Merge the trees of `a` and `b`, attaching `b`'s root under `a`'s.
    ///
    /// Returns false if they were already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }
        self.parent[root_b] = root_a;
        true
    }

    /// Node indexes grouped by tree, in order of each tree's first member.
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let mut slot_of_root: Vec<Option<usize>> = vec![None; self.len()];
        let mut components: Vec<Vec<usize>> = Vec::new();

        for node in 0..self.len() {
            let root = self.find(node);
            match slot_of_root[root] {
                Some(slot) => components[slot].push(node),
                None => {
                    slot_of_root[root] = Some(components.len());
                    components.push(vec![node]);
                }
            }
        }

        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_forest_is_all_singletons() {
        let mut forest = Forest::new(3);
        assert_eq!(forest.components(), vec![vec![0], vec![1], vec![2]]);
        assert!(Forest::new(0).is_empty());
    }

    #[test]
    fn union_attaches_second_root_under_first() {
        let mut forest = Forest::new(4);
        assert!(forest.union(2, 3));
        assert_eq!(forest.find(3), 2);
        assert!(forest.union(0, 3));
        assert_eq!(forest.find(2), 0);
        assert!(!forest.union(3, 0));
    }

    #[test]
    fn find_compresses_paths() {
        let mut forest = Forest::new(5);
        // build the chain 4 -> 3 -> 2 -> 1 -> 0
        for i in (1..5).rev() {
            forest.union(i - 1, i);
        }
        assert_eq!(forest.parent, vec![0, 0, 1, 2, 3]);

        assert_eq!(forest.find(4), 0);
        assert_eq!(forest.parent, vec![0, 0, 0, 0, 0]);
    }

    #[test]
    fn components_follow_first_member_order() {
        let mut forest = Forest::new(6);
        forest.union(5, 1);
        forest.union(3, 4);
        forest.union(4, 5);
        assert_eq!(forest.components(), vec![vec![0], vec![1, 3, 4, 5], vec![2]]);
    }
}
