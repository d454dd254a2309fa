//! Namespace checks against the operator allow-list alone, without consulting
//! RBAC.
//!
//! Used where the caller's own credentials are already enforced by the
//! Kubernetes API server and only the configured upper bound on namespace
//! scope has to be applied.

use crate::{Error, NamespaceArg, ALL_NAMESPACES, DEFAULT_NAMESPACE};

/// Resolves `arg` to a single namespace within `allowed`.
///
/// An empty allow-list permits everything.
pub fn to_namespace(allowed: &[String], arg: NamespaceArg) -> Result<String, Error> {
    let Some(ns) = arg.deref_or_else(|| DEFAULT_NAMESPACE.to_string()) else {
        return Ok(ALL_NAMESPACES.to_string());
    };

    if !allowed.is_empty() && !allowed.contains(&ns) {
        return Err(Error::Forbidden);
    }

    Ok(ns)
}

/// Resolves `arg` to a list of namespaces within `allowed`. A request for all
/// namespaces expands to the allow-list when one is configured.
pub fn to_namespaces(allowed: &[String], arg: NamespaceArg) -> Result<Vec<String>, Error> {
    let Some(ns) = arg.deref_or_else(|| DEFAULT_NAMESPACE.to_string()) else {
        return Ok(vec![ALL_NAMESPACES.to_string()]);
    };

    if ns == ALL_NAMESPACES {
        if allowed.is_empty() {
            return Ok(vec![ns]);
        }
        return Ok(allowed.to_vec());
    }

    if !allowed.is_empty() && !allowed.contains(&ns) {
        return Err(Error::Forbidden);
    }

    Ok(vec![ns])
}
