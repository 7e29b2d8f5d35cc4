//! Resolves a node address to the single live container carrying it.

use std::net::IpAddr;

use crate::runtime::{ContainerRuntime, ExecutionTarget};
use crate::transport::LocateError;

/// Finds the one running container whose primary address equals `address`.
///
/// The inventory is queried on every call. Addresses are compared in their
/// normalised [`IpAddr`] form, so `10.0.0.01`-style spellings reported by a
/// runtime never produce a false mismatch against a parsed address.
///
/// # Errors
///
/// Returns [`LocateError::NoMatch`] when nothing matches,
/// [`LocateError::AmbiguousMatch`] when several containers match and
/// [`LocateError::Inventory`] when the runtime cannot be listed.
pub fn resolve<R: ContainerRuntime + ?Sized>(
    runtime: &R,
    address: IpAddr,
) -> Result<ExecutionTarget, LocateError> {
    let wanted = address.to_string();
    let mut matches: Vec<ExecutionTarget> = runtime
        .list_targets()
        .map_err(LocateError::Inventory)?
        .into_iter()
        .filter(|target| {
            target
                .address
                .as_deref()
                .is_some_and(|candidate| normalise(candidate) == wanted)
        })
        .collect();

    match matches.len() {
        0 => Err(LocateError::NoMatch { address }),
        1 => {
            let target = matches.remove(0);
            tracing::debug!(
                address = %address,
                container = %target.id,
                name = target.name.as_deref().unwrap_or(""),
                "resolved node to container"
            );
            Ok(target)
        }
        count => Err(LocateError::AmbiguousMatch {
            address,
            matches: count,
        }),
    }
}

fn normalise(candidate: &str) -> String {
    let trimmed = candidate.trim();
    trimmed
        .parse::<IpAddr>()
        .map_or_else(|_| trimmed.to_owned(), |parsed| parsed.to_string())
}
