use huddle_core::IceCandidate;

/// Candidates that arrived before the session had a remote description.
///
/// Drained in arrival order; applying them out of order can leave the
/// transport without a working path.
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    pending: Vec<IceCandidate>,
}

impl CandidateBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, candidate: IceCandidate) {
        self.pending.push(candidate);
    }

    /// Hands every buffered candidate to `apply` in insertion order, then empties the buffer.
    pub fn drain_into<F>(&mut self, mut apply: F) -> usize
    where
        F: FnMut(IceCandidate),
    {
        let count = self.pending.len();
        for candidate in self.pending.drain(..) {
            apply(candidate);
        }
        count
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
