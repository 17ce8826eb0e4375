/// Default limit on codec recursion depth within one pass.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Default limit on map/sequence counts and string/byte lengths.
pub const DEFAULT_MAX_COLLECTION_LEN: u64 = 1 << 24;

/// Per-pass limits, shared by [`WriteContext`](crate::WriteContext) and
/// [`ReadContext`](crate::ReadContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassConfig {
    /// Deepest nesting of tagged values a pass will follow.
    pub max_depth: usize,
    /// Largest count or byte length accepted from a stream.
    pub max_collection_len: u64,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_collection_len: DEFAULT_MAX_COLLECTION_LEN,
        }
    }
}

impl PassConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_collection_len(mut self, max: u64) -> Self {
        self.max_collection_len = max;
        self
    }
}
