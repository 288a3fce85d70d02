//! Heap accounting used by the `alloc-track` leak tests.
//!
//! With the feature enabled the crate installs an instrumented global allocator; without it
//! every region reports zero activity.

/// Allocator activity observed inside an [`AllocRegion`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Number of allocations.
    pub allocations: usize,
    /// Number of deallocations.
    pub deallocations: usize,
    /// Number of reallocations.
    pub reallocations: usize,
    /// Bytes handed out.
    pub bytes_allocated: usize,
    /// Bytes returned.
    pub bytes_deallocated: usize,
}

impl AllocStats {
    /// Every allocation made inside the region was freed inside it, and nothing else was.
    pub fn is_balanced(&self) -> bool {
        self.allocations == self.deallocations && self.bytes_allocated == self.bytes_deallocated
    }
}

#[cfg(feature = "alloc-track")]
mod imp {
    use stats_alloc::{INSTRUMENTED_SYSTEM, Region, StatsAlloc};
    use std::alloc::System;

    use super::AllocStats;

    #[global_allocator]
    static GLOBAL: &StatsAlloc<System> = &INSTRUMENTED_SYSTEM;

    impl From<stats_alloc::Stats> for AllocStats {
        fn from(s: stats_alloc::Stats) -> Self {
            Self {
                allocations: s.allocations,
                deallocations: s.deallocations,
                reallocations: s.reallocations,
                bytes_allocated: s.bytes_allocated,
                bytes_deallocated: s.bytes_deallocated,
            }
        }
    }

    /// Snapshot of the global allocator counters.
    pub struct AllocRegion {
        region: Region<'static, System>,
    }

    impl AllocRegion {
        /// Start counting from now.
        pub fn new() -> Self {
            Self {
                region: Region::new(GLOBAL),
            }
        }

        /// Activity since [`AllocRegion::new`].
        pub fn change(&self) -> AllocStats {
            self.region.change().into()
        }
    }

    /// Whether counters are live in this build.
    pub const ENABLED: bool = true;
}

#[cfg(not(feature = "alloc-track"))]
mod imp {
    use super::AllocStats;

    /// Inert region; the feature is off.
    pub struct AllocRegion;

    impl AllocRegion {
        /// Start counting from now.
        pub fn new() -> Self {
            Self
        }

        /// Always empty without the feature.
        pub fn change(&self) -> AllocStats {
            AllocStats::default()
        }
    }

    /// Whether counters are live in this build.
    pub const ENABLED: bool = false;
}

pub use imp::{AllocRegion, ENABLED};

impl Default for AllocRegion {
    fn default() -> Self {
        Self::new()
    }
}
