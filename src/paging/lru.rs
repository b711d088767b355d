//! Least-recently-used victim selection

/// A resident item that could be evicted
#[derive(Debug, Clone, PartialEq)]
pub struct LruCandidate<K> {
    pub key: K,
    /// Render pass the item was last used in
    pub last_tick: u64,
    /// Part of the current pass's working set
    pub needed: bool,
}

/// Key of the candidate with the smallest `last_tick` among those not
/// needed. Ties go to the first candidate seen.
pub fn select_lru_victim<K, I>(candidates: I) -> Option<K>
where
    I: IntoIterator<Item = LruCandidate<K>>,
{
    let mut victim: Option<LruCandidate<K>> = None;
    for candidate in candidates.into_iter().filter(|c| !c.needed) {
        let better = match &victim {
            Some(current) => candidate.last_tick < current.last_tick,
            None => true,
        };
        if better {
            victim = Some(candidate);
        }
    }
    victim.map(|v| v.key)
}
