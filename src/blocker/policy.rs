//! Registry policy applied while the lock screen is up
//!
//! Policy values are deleted on restore rather than zeroed so the machine
//! returns to its pristine state. The two Search UI values are user
//! preferences and are written back to their enabled value instead.

use crate::os::{PolicyRegistry, RegistryHive};

const SYSTEM_POLICIES: &str = r"Software\Microsoft\Windows\CurrentVersion\Policies\System";
const EXPLORER_POLICIES_LM: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\Policies\Explorer";
const EXPLORER_POLICIES_CU: &str = r"Software\Microsoft\Windows\CurrentVersion\Policies\Explorer";
const SEARCH_POLICIES: &str = r"SOFTWARE\Policies\Microsoft\Windows\Windows Search";
const SEARCH_SETTINGS: &str = r"Software\Microsoft\Windows\CurrentVersion\Search";

/// How a value is put back on restore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restore {
    Delete,
    Write(u32),
}

/// One registry value written on apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyValue {
    pub hive: RegistryHive,
    pub path: &'static str,
    pub name: &'static str,
    pub value: u32,
    pub restore: Restore,
}

const fn policy(hive: RegistryHive, path: &'static str, name: &'static str, value: u32) -> PolicyValue {
    PolicyValue {
        hive,
        path,
        name,
        value,
        restore: Restore::Delete,
    }
}

/// Every value touched by the blocker
pub const POLICY_VALUES: &[PolicyValue] = &[
    policy(RegistryHive::CurrentUser, SYSTEM_POLICIES, "DisableTaskMgr", 1),
    policy(RegistryHive::LocalMachine, EXPLORER_POLICIES_LM, "NoRun", 1),
    policy(RegistryHive::LocalMachine, EXPLORER_POLICIES_LM, "NoWinKeys", 1),
    policy(RegistryHive::LocalMachine, EXPLORER_POLICIES_LM, "AltTabSettings", 1),
    policy(RegistryHive::CurrentUser, EXPLORER_POLICIES_CU, "NoRun", 1),
    policy(RegistryHive::CurrentUser, EXPLORER_POLICIES_CU, "NoWinKeys", 1),
    policy(RegistryHive::CurrentUser, EXPLORER_POLICIES_CU, "AltTabSettings", 1),
    policy(RegistryHive::LocalMachine, SEARCH_POLICIES, "DisableWebSearch", 1),
    policy(RegistryHive::LocalMachine, SEARCH_POLICIES, "AllowSearchToUseLocation", 0),
    PolicyValue {
        hive: RegistryHive::CurrentUser,
        path: SEARCH_SETTINGS,
        name: "SearchboxTaskbarMode",
        value: 0,
        restore: Restore::Write(1),
    },
    PolicyValue {
        hive: RegistryHive::CurrentUser,
        path: SEARCH_SETTINGS,
        name: "BingSearchEnabled",
        value: 0,
        restore: Restore::Write(1),
    },
];

/// Write every policy value. Each failure is logged and the rest still
/// applied. Returns true only if all writes succeeded.
pub fn apply(registry: &mut dyn PolicyRegistry) -> bool {
    let mut all_ok = true;
    for entry in POLICY_VALUES {
        if let Err(e) = registry.set_dword(entry.hive, entry.path, entry.name, entry.value) {
            tracing::warn!(primitive = e.primitive(), "Policy write skipped: {}", e);
            all_ok = false;
        }
    }
    registry.refresh_policy();

    if all_ok {
        tracing::info!("Registry policy applied ({} values)", POLICY_VALUES.len());
    }
    all_ok
}

/// Undo `apply`. Missing values are fine.
pub fn restore(registry: &mut dyn PolicyRegistry) {
    for entry in POLICY_VALUES {
        let result = match entry.restore {
            Restore::Delete => registry
                .delete_value(entry.hive, entry.path, entry.name)
                .map(|_| ()),
            Restore::Write(value) => registry.set_dword(entry.hive, entry.path, entry.name, value),
        };
        if let Err(e) = result {
            tracing::warn!(primitive = e.primitive(), "Policy restore skipped: {}", e);
        }
    }
    registry.refresh_policy();
    tracing::info!("Registry policy restored");
}
