//! Values derived lazily from raw message bytes.

/// Parse state of a [`Deferred`] value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum State {
    #[default]
    Unparsed,
    Parsed,
}

/// A value computed on first access from data held elsewhere in the message.
///
/// The storage is kept across [`invalidate`](Deferred::invalidate) so re-parsing the next
/// message reuses its buffers.
#[derive(Debug, Clone, Default)]
pub(crate) struct Deferred<T> {
    state: State,
    value: T,
}

impl<T> Deferred<T> {
    /// Returns the value, running `parse` on the stored value first if needed.
    pub(crate) fn get_or_parse<F>(&mut self, parse: F) -> &mut T
    where
        F: FnOnce(&mut T),
    {
        if self.state == State::Unparsed {
            parse(&mut self.value);
            self.state = State::Parsed;
        }
        &mut self.value
    }

    /// The value, only if it has been parsed.
    pub(crate) fn parsed(&self) -> Option<&T> {
        match self.state {
            State::Parsed => Some(&self.value),
            State::Unparsed => None,
        }
    }

    pub(crate) fn is_parsed(&self) -> bool {
        self.state == State::Parsed
    }

    /// Marks the value stale; the next access parses again.
    pub(crate) fn invalidate(&mut self) {
        self.state = State::Unparsed;
    }

    /// Marks the value as parsed and hands out its storage to be filled directly.
    pub(crate) fn set_parsed(&mut self) -> &mut T {
        self.state = State::Parsed;
        &mut self.value
    }
}
