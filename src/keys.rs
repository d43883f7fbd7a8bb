use fastrand::Rng;

/// Working set of API keys for one polling cycle.
///
/// Never empty: a key is only dropped while another one remains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPool {
    keys: Vec<String>,
}

impl KeyPool {
    /// Returns `None` when `keys` is empty.
    pub fn new(keys: Vec<String>) -> Option<Self> {
        if keys.is_empty() {
            None
        } else {
            Some(Self { keys })
        }
    }

    /// Picks a key uniformly at random.
    pub fn choose(&self, rng: &mut Rng) -> &str {
        &self.keys[rng.usize(..self.keys.len())]
    }

    /// Drops `key` unless it is the last one left. Returns whether it was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        if self.keys.len() < 2 {
            return false;
        }
        match self.keys.iter().position(|k| k == key) {
            Some(index) => {
                self.keys.remove(index);
                true
            }
            None => false,
        }
    }

    /// Keys still in rotation
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(keys: &[&str]) -> KeyPool {
        KeyPool::new(keys.iter().map(|k| k.to_string()).collect()).unwrap()
    }

    #[test]
    fn empty_pool_is_rejected() {
        assert!(KeyPool::new(Vec::new()).is_none());
    }

    #[test]
    fn last_key_is_never_removed() {
        let mut keys = pool(&["a", "b"]);
        assert!(keys.remove("a"));
        assert!(!keys.remove("b"));
        assert_eq!(keys.len(), 1);
        assert!(keys.contains("b"));
    }

    #[test]
    fn removing_unknown_key_is_noop() {
        let mut keys = pool(&["a", "b"]);
        assert!(!keys.remove("c"));
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn choose_reaches_every_key() {
        let keys = pool(&["a", "b", "c"]);
        let mut rng = Rng::with_seed(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(keys.choose(&mut rng).to_string());
        }
        assert_eq!(seen.len(), 3);
    }
}
