//! Groups photos into clusters using transitive relationships.
//!
//! If A matches B and B matches C, then {A, B, C} forms a single group
//! even if A doesn't directly match C.

/// Union-find over the positions `0..len` of a candidate set
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    /// Find root with path compression
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = x;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    /// Union two sets, smaller under larger
    pub fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        let (big, small) = if self.size[root_a] >= self.size[root_b] {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
    }

    /// Components with at least two members.
    ///
    /// Members are listed in ascending position and components are ordered
    /// by their smallest position, so output follows input order.
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let len = self.parent.len();
        let mut slot_of_root: Vec<Option<usize>> = vec![None; len];
        let mut components: Vec<Vec<usize>> = Vec::new();
        for position in 0..len {
            let root = self.find(position);
            match slot_of_root[root] {
                Some(slot) => components[slot].push(position),
                None => {
                    slot_of_root[root] = Some(components.len());
                    components.push(vec![position]);
                }
            }
        }
        components.retain(|members| members.len() >= 2);
        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_unions_yields_no_components() {
        let mut set = DisjointSet::new(4);
        assert!(set.components().is_empty());
    }

    #[test]
    fn single_pair_creates_single_component() {
        let mut set = DisjointSet::new(3);
        set.union(0, 2);
        assert_eq!(set.components(), vec![vec![0, 2]]);
    }

    #[test]
    fn transitive_grouping() {
        // 0~1 and 1~2 should create {0, 1, 2}
        let mut set = DisjointSet::new(4);
        set.union(0, 1);
        set.union(1, 2);
        assert_eq!(set.components(), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn disjoint_pairs_create_separate_components() {
        let mut set = DisjointSet::new(4);
        set.union(3, 1);
        set.union(0, 2);
        assert_eq!(set.components(), vec![vec![0, 2], vec![1, 3]]);
    }

    #[test]
    fn repeated_union_is_harmless() {
        let mut set = DisjointSet::new(2);
        set.union(0, 1);
        set.union(1, 0);
        assert_eq!(set.find(0), set.find(1));
        assert_eq!(set.components().len(), 1);
    }
}
