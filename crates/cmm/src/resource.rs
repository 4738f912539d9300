use std::fmt;

/// Default number of stack-mutating instructions (`push`, `pop`, `return`) between collections.
pub const DEFAULT_GC_INTERVAL: usize = 1024;

/// Recommended maximum call depth if not otherwise specified.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// Largest array `ResourceLimits::new()` and `NoLimitTracker` allow, in elements.
pub const DEFAULT_MAX_ARRAY_LEN: usize = 1 << 24;

/// Maximum nesting depth when copying arrays out of the heap into [`crate::Object`]s.
///
/// Deeper arrays are cut off. Lower in debug builds, which use more stack per frame.
#[cfg(debug_assertions)]
pub const MAX_DATA_RECURSION_DEPTH: u16 = 100;

/// Maximum nesting depth when copying arrays out of the heap into [`crate::Object`]s.
#[cfg(not(debug_assertions))]
pub const MAX_DATA_RECURSION_DEPTH: u16 = 500;

/// Error returned when a resource limit is exceeded during execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Maximum number of heap allocations exceeded.
    Allocation { limit: usize, count: usize },
    /// Maximum call depth exceeded.
    Recursion { limit: usize, depth: usize },
    /// An array larger than the configured maximum was requested.
    ArrayLength { limit: usize, len: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation { limit, count } => {
                write!(f, "allocation limit exceeded: {count} > {limit}")
            }
            Self::Recursion { limit, .. } => {
                write!(f, "maximum recursion depth exceeded ({limit})")
            }
            Self::ArrayLength { limit, len } => {
                write!(f, "array of {len} elements exceeds the limit of {limit}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// Trait for tracking resource usage and scheduling garbage collection.
///
/// The heap consults the tracker on every allocation and free, and the VM consults
/// it before pushing a call frame. `gc_interval` controls how often the collector runs.
pub trait ResourceTracker: fmt::Debug {
    /// Called before each heap allocation.
    ///
    /// Returns `Ok(())` if the allocation should proceed, or `Err(ResourceError)`
    /// if a limit would be exceeded.
    fn on_allocate(&mut self) -> Result<(), ResourceError>;

    /// Called when the collector frees a slot.
    fn on_free(&mut self);

    /// Called before pushing a new call frame.
    ///
    /// # Arguments
    /// * `current_depth` - Current call stack depth (before the new frame is pushed)
    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError>;

    /// Called before the VM creates an array of `len` elements.
    ///
    /// Array elements are not heap objects, so `on_allocate` alone cannot bound them.
    fn check_array_len(&self, len: usize) -> Result<(), ResourceError>;

    /// Number of stack-mutating instructions between garbage collections.
    fn gc_interval(&self) -> usize {
        DEFAULT_GC_INTERVAL
    }
}

/// A tracker that enforces nothing but the default recursion depth and array length.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    #[inline]
    fn on_allocate(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }

    #[inline]
    fn on_free(&mut self) {}

    #[inline]
    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError> {
        if current_depth >= DEFAULT_MAX_RECURSION_DEPTH {
            Err(ResourceError::Recursion {
                limit: DEFAULT_MAX_RECURSION_DEPTH,
                depth: current_depth + 1,
            })
        } else {
            Ok(())
        }
    }

    #[inline]
    fn check_array_len(&self, len: usize) -> Result<(), ResourceError> {
        if len > DEFAULT_MAX_ARRAY_LEN {
            Err(ResourceError::ArrayLength {
                limit: DEFAULT_MAX_ARRAY_LEN,
                len,
            })
        } else {
            Ok(())
        }
    }
}

/// Configuration for resource limits.
///
/// All limits are optional - set to `None` to disable a specific limit.
/// Use `ResourceLimits::default()` for no limits, or build custom limits
/// with the builder pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResourceLimits {
    /// Maximum number of live-or-freed heap allocations over the whole run.
    pub max_allocations: Option<usize>,
    /// Run garbage collection every N stack-mutating instructions.
    pub gc_interval: Option<usize>,
    /// Maximum call depth.
    pub max_recursion_depth: Option<usize>,
    /// Maximum number of elements in one array.
    pub max_array_len: Option<usize>,
}

impl ResourceLimits {
    /// Creates a new ResourceLimits with all limits disabled, except max recursion (1000)
    /// and max array length ([`DEFAULT_MAX_ARRAY_LEN`]).
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_recursion_depth: Some(DEFAULT_MAX_RECURSION_DEPTH),
            max_array_len: Some(DEFAULT_MAX_ARRAY_LEN),
            ..Default::default()
        }
    }

    /// Sets the maximum number of allocations.
    #[must_use]
    pub fn max_allocations(mut self, limit: usize) -> Self {
        self.max_allocations = Some(limit);
        self
    }

    /// Sets the garbage collection interval.
    #[must_use]
    pub fn gc_interval(mut self, interval: usize) -> Self {
        self.gc_interval = Some(interval);
        self
    }

    /// Sets the maximum recursion depth (function call stack depth).
    #[must_use]
    pub fn max_recursion_depth(mut self, limit: Option<usize>) -> Self {
        self.max_recursion_depth = limit;
        self
    }

    /// Sets the maximum array length, in elements.
    #[must_use]
    pub fn max_array_len(mut self, limit: Option<usize>) -> Self {
        self.max_array_len = limit;
        self
    }
}

/// A resource tracker that enforces configurable limits.
#[derive(Debug, Clone)]
pub struct LimitedTracker {
    limits: ResourceLimits,
    /// Total number of allocations made.
    allocation_count: usize,
    /// Number of slots freed by the collector.
    free_count: usize,
}

impl LimitedTracker {
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            allocation_count: 0,
            free_count: 0,
        }
    }

    /// Returns the current allocation count.
    #[must_use]
    pub fn allocation_count(&self) -> usize {
        self.allocation_count
    }

    /// Returns how many slots the collector has freed so far.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_count
    }

    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }
}

impl ResourceTracker for LimitedTracker {
    fn on_allocate(&mut self) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_allocations
            && self.allocation_count >= max
        {
            return Err(ResourceError::Allocation {
                limit: max,
                count: self.allocation_count + 1,
            });
        }
        self.allocation_count += 1;
        Ok(())
    }

    fn on_free(&mut self) {
        self.free_count += 1;
    }

    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_recursion_depth
            && current_depth >= max
        {
            return Err(ResourceError::Recursion {
                limit: max,
                depth: current_depth + 1,
            });
        }
        Ok(())
    }

    fn check_array_len(&self, len: usize) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_array_len
            && len > max
        {
            return Err(ResourceError::ArrayLength { limit: max, len });
        }
        Ok(())
    }

    fn gc_interval(&self) -> usize {
        // an interval of zero would collect after every instruction *and* never advance; clamp to 1
        self.limits.gc_interval.unwrap_or(DEFAULT_GC_INTERVAL).max(1)
    }
}
