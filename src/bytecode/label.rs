/// A jump target inside one bytecode array.
///
/// An unbound label that has been jumped to remembers only its most recent
/// referrer; the builder threads earlier referrers through its own link table.
/// Labels are deliberately not `Clone`: a copy would fork the referrer chain.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BytecodeLabel {
    state: LabelState,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LabelState {
    #[default]
    Unused,
    /// Forward jumps are waiting; `last_referrer` is the newest one.
    Linked { last_referrer: usize },
    Bound { offset: usize },
}

impl BytecodeLabel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state, LabelState::Bound { .. })
    }

    /// Whether jumps to this label are still waiting to be patched.
    pub fn is_forward_target(&self) -> bool {
        matches!(self.state, LabelState::Linked { .. })
    }

    pub fn offset(&self) -> Option<usize> {
        match self.state {
            LabelState::Bound { offset } => Some(offset),
            _ => None,
        }
    }

    pub(crate) fn state(&self) -> LabelState {
        self.state
    }

    pub(crate) fn set_referrer(&mut self, offset: usize) {
        assert!(!self.is_bound(), "bound labels take no forward referrers");
        self.state = LabelState::Linked {
            last_referrer: offset,
        };
    }

    pub(crate) fn bind_to(&mut self, offset: usize) {
        assert!(!self.is_bound(), "label is already bound");
        self.state = LabelState::Bound { offset };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let mut label = BytecodeLabel::new();
        assert_eq!(label.state(), LabelState::Unused);
        label.set_referrer(4);
        assert!(label.is_forward_target());
        label.set_referrer(9);
        assert_eq!(label.state(), LabelState::Linked { last_referrer: 9 });
        label.bind_to(12);
        assert_eq!(label.offset(), Some(12));
    }

    #[test]
    #[should_panic(expected = "already bound")]
    fn test_rebinding_is_fatal() {
        let mut label = BytecodeLabel::new();
        label.bind_to(0);
        label.bind_to(2);
    }
}
