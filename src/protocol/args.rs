//! Typed OSC Argument Access
//!
//! TUIO messages put the command name ("set", "alive", "fseq") in the
//! first argument and a fixed, profile-specific layout after it. A
//! malformed layout from a conforming sender cannot happen, so the
//! accessors treat arity or type mismatches as contract violations and
//! panic with the offending index rather than limping on with garbage
//! coordinates.

use rosc::OscType;

use crate::model::SessionId;

/// Read window over one message's argument list.
pub(crate) struct Args<'a> {
    args: &'a [OscType],
}

impl<'a> Args<'a> {
    pub(crate) fn new(args: &'a [OscType]) -> Self {
        Args { args }
    }

    /// The command name, if the first argument is a string.
    pub(crate) fn command(&self) -> Option<&str> {
        match self.args.first() {
            Some(OscType::String(cmd)) => Some(cmd.as_str()),
            _ => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.args.len()
    }

    /// Integer argument at `index`.
    pub(crate) fn int(&self, index: usize) -> i32 {
        match self.get(index) {
            OscType::Int(v) => *v,
            other => panic!("argument {index} is not an int32: {other:?}"),
        }
    }

    /// Session ID argument at `index`. Senders vary between int32 and
    /// int64 encodings.
    pub(crate) fn session(&self, index: usize) -> SessionId {
        match self.get(index) {
            OscType::Int(v) => SessionId::from(*v),
            OscType::Long(v) => *v,
            other => panic!("argument {index} is not a session ID: {other:?}"),
        }
    }

    /// Float argument at `index`, widening doubles.
    pub(crate) fn float(&self, index: usize) -> f32 {
        match self.get(index) {
            OscType::Float(v) => *v,
            OscType::Double(v) => *v as f32,
            other => panic!("argument {index} is not a float: {other:?}"),
        }
    }

    /// Variadic session ID tail starting at `index`, as carried by
    /// `alive` commands.
    pub(crate) fn sessions_from(&self, index: usize) -> impl Iterator<Item = SessionId> + '_ {
        (index..self.args.len()).map(move |i| self.session(i))
    }

    fn get(&self, index: usize) -> &OscType {
        self.args
            .get(index)
            .unwrap_or_else(|| panic!("argument {index} missing, message has {}", self.args.len()))
    }
}
