//! Optional heap usage sampling.

use framekeeper_core::MemoryMetrics;

/// Collaborator that reports memory usage at frame completion.
pub trait MemoryProbe: Send {
    /// Current usage, or `None` when the platform cannot report it.
    fn sample(&self) -> Option<MemoryMetrics>;
}

/// [`MemoryProbe`] backed by a closure.
pub struct FnMemoryProbe<F>(pub F);

impl<F> MemoryProbe for FnMemoryProbe<F>
where
    F: Fn() -> Option<MemoryMetrics> + Send,
{
    fn sample(&self) -> Option<MemoryMetrics> {
        (self.0)()
    }
}
