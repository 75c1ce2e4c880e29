use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Bounds of the per-document account threshold. The effective threshold
/// is drawn uniformly from `[min, max]` for each registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiAccountLimits {
    pub min: u32,
    pub max: u32,
}

impl MultiAccountLimits {
    /// Build validated limits.
    pub fn new(min: u32, max: u32) -> Result<Self, CoreError> {
        if min == 0 {
            return Err(CoreError::ValidationError(
                "multi-account minimum limit must be at least 1".into(),
            ));
        }
        if min > max {
            return Err(CoreError::ValidationError(format!(
                "multi-account minimum limit {} exceeds maximum {}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }
}

/// Shape of the uniqueness circuit's nullifier tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Number of leaf slots the circuit proves membership for.
    pub nullifiers_count: usize,
    /// Tree depth; the tree holds `2^tree_depth` leaves.
    pub tree_depth: u32,
}

impl TreeParams {
    pub const MAX_DEPTH: u32 = 20;

    /// Build validated tree parameters.
    pub fn new(nullifiers_count: usize, tree_depth: u32) -> Result<Self, CoreError> {
        if tree_depth == 0 || tree_depth > Self::MAX_DEPTH {
            return Err(CoreError::ValidationError(format!(
                "tree depth must be in 1..={}, got {}",
                Self::MAX_DEPTH,
                tree_depth
            )));
        }
        if nullifiers_count == 0 {
            return Err(CoreError::ValidationError(
                "nullifiers count must be at least 1".into(),
            ));
        }
        let capacity = 1u64 << tree_depth;
        if nullifiers_count as u64 > capacity {
            return Err(CoreError::ValidationError(format!(
                "nullifiers count {} exceeds tree capacity {}",
                nullifiers_count, capacity
            )));
        }
        Ok(Self {
            nullifiers_count,
            tree_depth,
        })
    }

    /// Number of leaves in the full tree.
    pub fn capacity(&self) -> usize {
        1usize << self.tree_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_account_limits() {
        assert!(MultiAccountLimits::new(2, 5).is_ok());
        assert!(MultiAccountLimits::new(3, 3).is_ok());
        assert!(MultiAccountLimits::new(0, 3).is_err());
        assert!(MultiAccountLimits::new(4, 3).is_err());
    }

    #[test]
    fn test_tree_params() {
        let params = TreeParams::new(4, 2).unwrap();
        assert_eq!(params.capacity(), 4);
        assert!(TreeParams::new(5, 2).is_err());
        assert!(TreeParams::new(0, 2).is_err());
        assert!(TreeParams::new(1, 0).is_err());
        assert!(TreeParams::new(1, 21).is_err());
    }

    #[test]
    fn test_tree_params_serde_roundtrip() {
        let params = TreeParams::new(10, 4).unwrap();
        let json = serde_json::to_string(&params).unwrap();
        let back: TreeParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
