// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier newtypes for messages and worker instances.
//!
//! Message IDs arrive on the wire from workers we do not control, so both
//! types wrap an owned `String` rather than a fixed-size buffer. Locally
//! generated IDs use a 4-char type prefix plus a 19-char nanoid.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

macro_rules! string_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Wrap an existing identifier (wire input, tests).
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh random identifier with the type prefix.
            pub fn generate() -> Self {
                Self(format!("{}{}", Self::PREFIX, nanoid::nanoid!(19)))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Unique identifier of a logical request, generated by the originating
    /// worker and carried unchanged through every hop.
    pub struct MessageId("msg-");
}

string_id! {
    /// Supervisor-local identifier of a single spawned worker process.
    ///
    /// Distinct from the PID (which the OS may reuse) and from the worker's
    /// self-reported instance ID (which only appears in health beats).
    pub struct WorkerId("wkr-");
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
