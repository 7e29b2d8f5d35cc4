//! Declared operation sets for concrete transports.

use std::fmt;

use super::TransportError;

/// Operations a [`NodeTransport`](super::NodeTransport) may support.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Capability {
    /// Run a command to completion and collect its result.
    Run,
    /// Open a pipe to a live remote process.
    Popen,
    /// Copy a local file onto the node.
    SendFile,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Run => "run",
            Self::Popen => "popen",
            Self::SendFile => "send_file",
        };
        f.write_str(name)
    }
}

/// Set of operations implemented by a transport.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Capabilities {
    run: bool,
    popen: bool,
    send_file: bool,
}

impl Capabilities {
    /// Every operation of the transport contract.
    pub const ALL: Self = Self {
        run: true,
        popen: true,
        send_file: true,
    };

    /// Returns a copy of the set with `capability` removed.
    #[must_use]
    pub const fn without(self, capability: Capability) -> Self {
        match capability {
            Capability::Run => Self { run: false, ..self },
            Capability::Popen => Self {
                popen: false,
                ..self
            },
            Capability::SendFile => Self {
                send_file: false,
                ..self
            },
        }
    }

    /// Returns `true` when `capability` is part of the set.
    #[must_use]
    pub const fn supports(self, capability: Capability) -> bool {
        match capability {
            Capability::Run => self.run,
            Capability::Popen => self.popen,
            Capability::SendFile => self.send_file,
        }
    }

    /// Fails with [`TransportError::Unsupported`] when `capability` is absent.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unsupported`] naming `transport` and the
    /// missing operation.
    pub const fn ensure(
        self,
        transport: &'static str,
        capability: Capability,
    ) -> Result<(), TransportError> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(TransportError::Unsupported {
                transport,
                operation: capability,
            })
        }
    }
}
