use crate::db::indices::ComponentId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PinRef {
    pub component: ComponentId,
    pub pin: String,
}

impl PinRef {
    pub fn new(component: ComponentId, pin: &str) -> Self {
        Self {
            component,
            pin: pin.to_string(),
        }
    }
}

/// Intended connectivity of one net, produced by netlist extraction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetDef {
    pub name: String,
    #[serde(default)]
    pub connections: Vec<PinRef>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetList {
    #[serde(default)]
    pub nets: Vec<NetDef>,
}

impl NetList {
    pub fn new(nets: Vec<NetDef>) -> Self {
        Self { nets }
    }

    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    /// Nets with at least two pin references; only these need wiring.
    pub fn routable(&self) -> impl Iterator<Item = (usize, &NetDef)> {
        self.nets
            .iter()
            .enumerate()
            .filter(|(_, n)| n.connections.len() >= 2)
    }

    pub fn nets_of(&self, component: ComponentId) -> Vec<usize> {
        self.nets
            .iter()
            .enumerate()
            .filter(|(_, n)| n.connections.iter().any(|p| p.component == component))
            .map(|(i, _)| i)
            .collect()
    }
}
