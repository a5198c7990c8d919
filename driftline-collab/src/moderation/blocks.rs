use std::collections::{BTreeSet, HashSet};

use parking_lot::RwLock;

/// Process-wide blocks between users.
///
/// Blocks are stored in the direction they were made, so a user can list
/// and lift only their own blocks, but every check goes both ways.
#[derive(Debug, Default)]
pub struct BlockList {
    pairs: RwLock<HashSet<(String, String)>>,
}

impl BlockList {
    /// Returns true if the block is new
    pub fn block(&self, blocker: &str, target: &str) -> bool {
        self.pairs
            .write()
            .insert((blocker.to_string(), target.to_string()))
    }

    /// Returns true if a block was lifted
    pub fn unblock(&self, blocker: &str, target: &str) -> bool {
        self.pairs
            .write()
            .remove(&(blocker.to_string(), target.to_string()))
    }

    /// Returns true if either user has blocked the other
    pub fn is_blocked_between(&self, a: &str, b: &str) -> bool {
        let pairs = self.pairs.read();

        pairs.contains(&(a.to_string(), b.to_string()))
            || pairs.contains(&(b.to_string(), a.to_string()))
    }

    /// The users `blocker` has blocked
    pub fn blocked_by(&self, blocker: &str) -> Vec<String> {
        self.pairs
            .read()
            .iter()
            .filter(|(from, _)| from == blocker)
            .map(|(_, to)| to.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_blocks_are_symmetric() {
        let blocks = BlockList::default();

        assert!(blocks.block("a", "b"));
        assert!(!blocks.block("a", "b"), "blocking twice is a no-op");

        assert!(blocks.is_blocked_between("a", "b"));
        assert!(blocks.is_blocked_between("b", "a"));
        assert!(!blocks.is_blocked_between("a", "c"));
    }

    #[test]
    fn test_only_blocker_can_unblock() {
        let blocks = BlockList::default();
        blocks.block("a", "b");

        assert!(!blocks.unblock("b", "a"));
        assert!(blocks.is_blocked_between("a", "b"));

        assert!(blocks.unblock("a", "b"));
        assert!(!blocks.is_blocked_between("a", "b"));
    }

    #[test]
    fn test_blocked_by_lists_own_blocks() {
        let blocks = BlockList::default();
        blocks.block("a", "c");
        blocks.block("a", "b");
        blocks.block("b", "a");

        assert_eq!(blocks.blocked_by("a"), vec!["b", "c"]);
        assert_eq!(blocks.blocked_by("c"), Vec::<String>::new());
    }
}
