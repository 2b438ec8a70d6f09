//! Control resolver.
//!
//! Maps an [`Identifier`] to the live [`Control`] in the *current*
//! hardware tree.  Resolution walks the tree on every call: the tree is
//! rebuilt whenever hardware is rescanned, so a control found last tick
//! may be gone (or replaced) this tick.

use crate::app::ports::Control;
use crate::hardware::{HardwareTree, Identifier};

/// Every control reachable from a sensor, in traversal order.
pub fn controls(tree: &HardwareTree) -> impl Iterator<Item = &dyn Control> {
    tree.sensors()
        .into_iter()
        .filter_map(|sensor| sensor.control.as_deref())
}

/// First control whose identifier equals `identifier`, if any.
pub fn resolve<'a>(tree: &'a HardwareTree, identifier: &Identifier) -> Option<&'a dyn Control> {
    controls(tree).find(|c| c.identifier() == identifier)
}
