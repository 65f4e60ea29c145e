//! Kernel behaviour flags.

use serde::{Deserialize, Serialize};

/// Member-injection policy for a kernel.
///
/// Both flags are off for a bare kernel. The default resolution strategy
/// turns both on, because self-injecting objects usually keep their
/// dependencies in non-`pub` fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSettings {
    /// Inject into non-`pub` fields marked `#[inject]`.
    #[serde(default)]
    pub inject_non_public: bool,
    /// Inject into non-`pub` fields of values embedded with `#[inject(base)]`.
    /// Only effective together with `inject_non_public`.
    #[serde(default)]
    pub inject_parent_private: bool,
}

impl KernelSettings {
    /// Settings with both non-public flags enabled.
    pub fn permissive() -> Self {
        Self {
            inject_non_public: true,
            inject_parent_private: true,
        }
    }
}
