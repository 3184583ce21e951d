// SPDX-License-Identifier: GPL-3.0-only
//! Bus reconciler
//!
//! Brings the set of buses with a ddcci binding in line with the set of buses
//! that currently have a monitor. Both sets are rebuilt on every pass.

use std::collections::BTreeSet;

use crate::inventory::DisplayInventory;
use crate::sysfs::{self, DDCCI_ADDRESS, DDCCI_NEW_DEVICE, DDCCI_PREFIX, Sysfs};

pub type BusId = u32;
pub type BusSet = BTreeSet<BusId>;

/// Work needed to turn the attached set into the detected set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusPlan {
    /// Detected but not bound
    pub attach: BusSet,
    /// Bound but no longer detected
    pub detach: BusSet,
}

impl BusPlan {
    pub fn is_empty(&self) -> bool {
        self.attach.is_empty() && self.detach.is_empty()
    }
}

pub fn plan(detected: &BusSet, attached: &BusSet) -> BusPlan {
    BusPlan {
        attach: detected.difference(attached).copied().collect(),
        detach: attached.difference(detected).copied().collect(),
    }
}

/// Buses with a `ddcci<N>` entry in the ddcci device directory
pub fn attached_buses(sysfs: &Sysfs) -> BusSet {
    sysfs::entry_names(&sysfs.ddcci_devices())
        .iter()
        .filter_map(|name| {
            let rest = name.strip_prefix(DDCCI_PREFIX)?;
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        })
        .collect()
}

pub fn is_attached(sysfs: &Sysfs, bus: BusId) -> bool {
    sysfs::is_directory(&sysfs.ddcci_device(bus))
}

/// Instantiate a ddcci client on `bus`; returns whether a write was issued
pub fn attach(sysfs: &Sysfs, bus: BusId) -> bool {
    if is_attached(sysfs, bus) {
        info!("ddcci already attached on i2c-{}, skipping", bus);
        return false;
    }

    info!("Attaching ddcci on i2c-{}", bus);
    let path = sysfs.i2c_adapter(bus).join("new_device");
    if let Err(e) = sysfs::write_attr(&path, DDCCI_NEW_DEVICE) {
        warn!("Failed to write {}: {}", path.display(), e);
    }
    true
}

/// Remove the ddcci client from `bus`; returns whether a write was issued
pub fn detach(sysfs: &Sysfs, bus: BusId) -> bool {
    if !is_attached(sysfs, bus) {
        info!("ddcci not attached on i2c-{}, skipping", bus);
        return false;
    }

    info!("Detaching ddcci on i2c-{}", bus);
    let path = sysfs.i2c_adapter(bus).join("delete_device");
    if let Err(e) = sysfs::write_attr(&path, DDCCI_ADDRESS) {
        warn!("Failed to write {}: {}", path.display(), e);
    }
    true
}

/// Run one reconciliation pass and return the plan that was applied
pub fn reconcile(sysfs: &Sysfs, inventory: &mut dyn DisplayInventory) -> BusPlan {
    let detected = inventory.detected_buses();
    let attached = attached_buses(sysfs);
    debug!("Detected buses: {:?}, attached buses: {:?}", detected, attached);

    let plan = plan(&detected, &attached);
    if plan.is_empty() {
        debug!("ddcci bindings already up to date");
    }

    for &bus in &plan.attach {
        attach(sysfs, bus);
    }
    for &bus in &plan.detach {
        detach(sysfs, bus);
    }

    plan
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;

    /// Inventory returning a fixed set
    pub struct FixedInventory(pub BusSet);

    impl DisplayInventory for FixedInventory {
        fn detected_buses(&mut self) -> BusSet {
            self.0.clone()
        }
    }

    pub fn set(buses: &[BusId]) -> BusSet {
        buses.iter().copied().collect()
    }

    /// Fake sysfs with writable adapter attributes for `adapters` and a
    /// `ddcci<N>` directory for every bus in `attached`
    pub fn make_tree(adapters: &[BusId], attached: &[BusId]) -> (tempfile::TempDir, Sysfs) {
        let root = tempfile::tempdir().unwrap();
        let sysfs = Sysfs::new(root.path());
        fs::create_dir_all(sysfs.ddcci_devices()).unwrap();
        for &bus in adapters.iter().chain(attached) {
            let adapter = sysfs.i2c_adapter(bus);
            fs::create_dir_all(&adapter).unwrap();
            fs::write(adapter.join("new_device"), "").unwrap();
            fs::write(adapter.join("delete_device"), "").unwrap();
        }
        for &bus in attached {
            fs::create_dir_all(sysfs.ddcci_device(bus)).unwrap();
        }
        (root, sysfs)
    }

    pub fn written(sysfs: &Sysfs, bus: BusId, attr: &str) -> String {
        fs::read_to_string(sysfs.i2c_adapter(bus).join(attr)).unwrap()
    }

    #[test]
    fn test_binds_new_buses() {
        let (_root, sysfs) = make_tree(&[2, 4], &[]);
        let mut inventory = FixedInventory(set(&[2, 4]));

        let applied = reconcile(&sysfs, &mut inventory);

        assert_eq!(applied.attach, set(&[2, 4]));
        assert!(applied.detach.is_empty());
        assert_eq!(written(&sysfs, 2, "new_device"), "ddcci 0x37");
        assert_eq!(written(&sysfs, 4, "new_device"), "ddcci 0x37");
        assert_eq!(written(&sysfs, 2, "delete_device"), "");
    }

    #[test]
    fn test_unbinds_vanished_bus() {
        let (_root, sysfs) = make_tree(&[], &[2, 6]);
        let mut inventory = FixedInventory(set(&[2]));

        let applied = reconcile(&sysfs, &mut inventory);

        assert!(applied.attach.is_empty());
        assert_eq!(applied.detach, set(&[6]));
        assert_eq!(written(&sysfs, 6, "delete_device"), "0x37");
        assert_eq!(written(&sysfs, 2, "delete_device"), "");
        assert_eq!(written(&sysfs, 2, "new_device"), "");
    }

    #[test]
    fn test_nothing_to_do() {
        let (_root, sysfs) = make_tree(&[], &[]);
        let applied = reconcile(&sysfs, &mut FixedInventory(BusSet::new()));
        assert!(applied.is_empty());
    }

    #[test]
    fn test_missing_ddcci_bus_directory() {
        let root = tempfile::tempdir().unwrap();
        let sysfs = Sysfs::new(root.path());
        assert!(attached_buses(&sysfs).is_empty());
    }

    #[test]
    fn test_attached_buses_parsing() {
        let (_root, sysfs) = make_tree(&[], &[0, 11]);
        fs::create_dir(sysfs.ddcci_devices().join("ddcci")).unwrap();
        fs::create_dir(sysfs.ddcci_devices().join("something3")).unwrap();
        assert_eq!(attached_buses(&sysfs), set(&[0, 11]));
    }

    #[test]
    fn test_attach_guard() {
        let (_root, sysfs) = make_tree(&[], &[3]);
        assert!(!attach(&sysfs, 3));
        assert_eq!(written(&sysfs, 3, "new_device"), "");
    }

    #[test]
    fn test_detach_guard() {
        let (_root, sysfs) = make_tree(&[5], &[]);
        assert!(!detach(&sysfs, 5));
        assert_eq!(written(&sysfs, 5, "delete_device"), "");
    }

    #[test]
    fn test_write_failure_is_not_fatal() {
        // no adapter directory at all
        let (_root, sysfs) = make_tree(&[], &[]);
        assert!(attach(&sysfs, 9));
    }

    fn bus_set() -> impl Strategy<Value = BusSet> {
        prop::collection::btree_set(0u32..16, 0..8)
    }

    /// Apply a plan to a model of the attached set
    fn apply(attached: &BusSet, plan: &BusPlan) -> BusSet {
        let mut result = attached.clone();
        for bus in &plan.attach {
            assert!(result.insert(*bus));
        }
        for bus in &plan.detach {
            assert!(result.remove(bus));
        }
        result
    }

    proptest! {
        #[test]
        fn prop_converges(detected in bus_set(), attached in bus_set()) {
            let p = plan(&detected, &attached);
            prop_assert_eq!(apply(&attached, &p), detected);
        }

        #[test]
        fn prop_idempotent(detected in bus_set(), attached in bus_set()) {
            let after = apply(&attached, &plan(&detected, &attached));
            prop_assert!(plan(&detected, &after).is_empty());
        }

        #[test]
        fn prop_symmetric_difference(detected in bus_set(), attached in bus_set()) {
            let p = plan(&detected, &attached);
            prop_assert!(p.attach.is_disjoint(&p.detach));
            let union: BusSet = p.attach.union(&p.detach).copied().collect();
            let expected: BusSet = detected.symmetric_difference(&attached).copied().collect();
            prop_assert_eq!(union, expected);
        }
    }
}
