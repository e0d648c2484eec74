//! Segment trie used to prune extension probing.

use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
struct TrieNode {
    children: BTreeMap<String, TrieNode>,
}

/// Path-prefix trie over lowercased relative paths.
///
/// `has_prefix("src/lib")` is true when some indexed path has the segments
/// `src` and then a segment starting with `lib` (`lib.ts`, `lib/index.ts`,
/// `library.js`). A false answer guarantees no extension or index candidate
/// for that base exists.
#[derive(Debug, Default, Clone)]
pub struct PathTrie {
    root: TrieNode,
}

impl PathTrie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rel: &str) {
        let mut node = &mut self.root;
        for segment in rel.split('/').filter(|s| !s.is_empty()) {
            node = node.children.entry(segment.to_lowercase()).or_default();
        }
    }

    pub fn has_prefix(&self, rel: &str) -> bool {
        let lower = rel.to_lowercase();
        let segments: Vec<&str> = lower.split('/').filter(|s| !s.is_empty()).collect();
        let Some((last, dirs)) = segments.split_last() else {
            return false;
        };
        let mut node = &self.root;
        for segment in dirs {
            match node.children.get(*segment) {
                Some(next) => node = next,
                None => return false,
            }
        }
        node.children
            .range::<str, _>((std::ops::Bound::Included(*last), std::ops::Bound::Unbounded))
            .next()
            .is_some_and(|(name, _)| name.starts_with(last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matches_files_and_dirs() {
        let mut trie = PathTrie::new();
        trie.insert("src/lib.ts");
        trie.insert("src/widgets/index.tsx");

        assert!(trie.has_prefix("src/lib"));
        assert!(trie.has_prefix("src/widgets"));
        assert!(trie.has_prefix("SRC/Lib"));
        assert!(!trie.has_prefix("src/missing"));
        assert!(!trie.has_prefix("other/lib"));
        assert!(!trie.has_prefix(""));
    }
}
