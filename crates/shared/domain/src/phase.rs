//! Deployment processing phases and the priority encoding built on them.
//!
//! A processor priority is a plain `i64`. Phase-aware priorities place the phase
//! ordinal in the high 32 bits and a slot in the low 32 bits, so every priority of
//! [`Phase::Parse`] sorts after every priority of [`Phase::Structure`] regardless of
//! slot. Slots used by the bundled subsystems are listed in [`slots`] to keep the
//! global ordering in one place.

use serde::{Deserialize, Serialize};
use std::fmt;

const PHASE_SHIFT: u32 = 32;
const SLOT_MASK: i64 = 0xFFFF_FFFF;

/// Ordered stages a deployment unit passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Deployment roots are mounted and the structure is discovered.
    Structure,
    /// Descriptors and the manifest are interpreted.
    Parse,
    /// Parsed metadata is registered with interested subsystems.
    Register,
    /// Module dependencies are assembled.
    Dependencies,
    ConfigureModule,
    /// Work that must finish before application classes are first used.
    FirstModuleUse,
    PostModule,
    /// Runtime services are installed.
    Install,
    Cleanup,
}

impl Phase {
    const ALL: [Self; 9] = [
        Self::Structure,
        Self::Parse,
        Self::Register,
        Self::Dependencies,
        Self::ConfigureModule,
        Self::FirstModuleUse,
        Self::PostModule,
        Self::Install,
        Self::Cleanup,
    ];

    /// All phases in execution order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &Self::ALL
    }

    /// The following phase, `None` after [`Phase::Cleanup`].
    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.ordinal() + 1).copied()
    }

    #[must_use]
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    /// Composes a processor priority for `slot` within this phase.
    #[must_use]
    pub const fn priority(self, slot: u32) -> i64 {
        ((self as i64) << PHASE_SHIFT) | slot as i64
    }

    /// Recovers the phase a priority was composed for.
    ///
    /// Returns `None` for negative priorities or ordinals past [`Phase::Cleanup`].
    #[must_use]
    pub fn of(priority: i64) -> Option<Self> {
        if priority < 0 {
            return None;
        }
        usize::try_from(priority >> PHASE_SHIFT).ok().and_then(|ord| Self::ALL.get(ord).copied())
    }

    /// The slot part of a phase-composed priority.
    #[must_use]
    pub const fn slot(priority: i64) -> u32 {
        (priority & SLOT_MASK) as u32
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::Parse => "parse",
            Self::Register => "register",
            Self::Dependencies => "dependencies",
            Self::ConfigureModule => "configure-module",
            Self::FirstModuleUse => "first-module-use",
            Self::PostModule => "post-module",
            Self::Install => "install",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slot constants of the bundled subsystems, grouped by phase.
pub mod slots {
    pub const STRUCTURE_EAR: u32 = 0x0B00;

    pub const PARSE_MANIFEST_CLASS_PATH: u32 = 0x0100;
    pub const PARSE_WEB_DESCRIPTOR: u32 = 0x0E00;
    pub const PARSE_EAR_DESCRIPTOR: u32 = 0x0F00;

    pub const DEPENDENCIES_MODULE: u32 = 0x0100;

    pub const POST_MODULE_WEB_CONTEXT_ROOT: u32 = 0x0200;

    pub const INSTALL_MODULE: u32 = 0x0100;
    pub const INSTALL_WEB_CONTEXT: u32 = 0x2000;
    pub const INSTALL_EAR_APPLICATION: u32 = 0x3000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_priorities_dominate_slots() {
        assert!(Phase::Structure.priority(u32::MAX) < Phase::Parse.priority(0));
        assert!(Phase::Install.priority(1) < Phase::Install.priority(2));
    }

    #[test]
    fn test_priority_decomposes() {
        let priority = Phase::PostModule.priority(slots::POST_MODULE_WEB_CONTEXT_ROOT);
        assert_eq!(Phase::of(priority), Some(Phase::PostModule));
        assert_eq!(Phase::slot(priority), slots::POST_MODULE_WEB_CONTEXT_ROOT);
        assert_eq!(Phase::of(-1), None);
        assert_eq!(Phase::of(i64::MAX), None);
    }

    #[test]
    fn test_next_walks_in_order() {
        let mut walked = vec![Phase::Structure];
        while let Some(next) = walked.last().and_then(|p| p.next()) {
            walked.push(next);
        }
        assert_eq!(walked, Phase::all());
        assert_eq!(Phase::Cleanup.next(), None);
    }
}
