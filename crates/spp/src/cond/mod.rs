//! Conditional compilation state

/// State of one `#if`/`#endif` nesting level.
///
/// `branch_taken` is set once any branch of the chain has fired; later
/// `#elif`/`#else` branches are then skipped regardless of their own
/// condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionalFrame {
    pub branch_taken: bool,
}

/// Stack of conditional frames, one per open `#if` family directive.
#[derive(Debug, Default)]
pub struct ConditionalStack {
    frames: Vec<ConditionalFrame>,
}

impl ConditionalStack {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn push(&mut self, branch_taken: bool) {
        self.frames.push(ConditionalFrame { branch_taken });
    }

    /// Pop the innermost frame; `None` on underflow (unmatched directive).
    pub fn pop(&mut self) -> Option<ConditionalFrame> {
        self.frames.pop()
    }

    /// `branch_taken` of the innermost frame.
    pub fn top_taken(&self) -> Option<bool> {
        self.frames.last().map(|frame| frame.branch_taken)
    }

    /// Mark the innermost frame's branch as fired.
    pub fn mark_taken(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.branch_taken = true;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop() {
        let mut stack = ConditionalStack::new();
        assert!(stack.is_empty());
        stack.push(false);
        stack.push(true);
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.top_taken(), Some(true));
        stack.pop();
        assert_eq!(stack.top_taken(), Some(false));
        stack.pop();
        assert!(stack.pop().is_none());
    }

    #[test]
    fn test_mark_taken() {
        let mut stack = ConditionalStack::new();
        stack.push(false);
        stack.mark_taken();
        assert_eq!(stack.top_taken(), Some(true));
    }
}
