//! Device classes and device nodes.

use gpioled_common::hal::host::HostError;
use gpioled_common::hal::types::{ClassHandle, DeviceNumber, NodeHandle};
use serde::Serialize;
use std::collections::BTreeMap;

/// A device node as exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceNode {
    /// Node name (`/dev/<name>`).
    pub name: String,
    /// Class the node lives under.
    pub class: String,
    /// Device number the node is bound to.
    pub number: DeviceNumber,
}

#[derive(Debug)]
struct NodeEntry {
    class: ClassHandle,
    number: DeviceNumber,
    name: String,
}

/// Class and node registry.
#[derive(Debug, Default)]
pub(crate) struct ClassRegistry {
    next_id: u32,
    classes: BTreeMap<u32, String>,
    nodes: BTreeMap<u32, NodeEntry>,
}

impl ClassRegistry {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn class_create(&mut self, name: &str) -> Result<ClassHandle, HostError> {
        if self.classes.values().any(|c| c == name) {
            return Err(HostError::Exists(format!("class {name}")));
        }
        let id = self.next_id();
        self.classes.insert(id, name.to_string());
        Ok(ClassHandle(id))
    }

    pub(crate) fn class_destroy(&mut self, class: ClassHandle) -> Result<(), HostError> {
        if self.nodes.values().any(|n| n.class == class) {
            return Err(HostError::Busy(format!("class {} has nodes", class.0)));
        }
        self.classes
            .remove(&class.0)
            .map(|_| ())
            .ok_or_else(|| HostError::NotFound(format!("class {}", class.0)))
    }

    pub(crate) fn device_create(
        &mut self,
        class: ClassHandle,
        number: DeviceNumber,
        name: &str,
    ) -> Result<NodeHandle, HostError> {
        if !self.classes.contains_key(&class.0) {
            return Err(HostError::NotFound(format!("class {}", class.0)));
        }
        if self.nodes.values().any(|n| n.name == name) {
            return Err(HostError::Exists(format!("/dev/{name}")));
        }
        let id = self.next_id();
        self.nodes.insert(
            id,
            NodeEntry {
                class,
                number,
                name: name.to_string(),
            },
        );
        Ok(NodeHandle(id))
    }

    pub(crate) fn device_destroy(&mut self, class: ClassHandle, number: DeviceNumber) -> Result<(), HostError> {
        let id = self
            .nodes
            .iter()
            .find(|(_, n)| n.class == class && n.number == number)
            .map(|(id, _)| *id)
            .ok_or_else(|| HostError::NotFound(format!("node {number}")))?;
        self.nodes.remove(&id);
        Ok(())
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<DeviceNumber> {
        self.nodes.values().find(|n| n.name == name).map(|n| n.number)
    }

    pub(crate) fn classes(&self) -> Vec<String> {
        self.classes.values().cloned().collect()
    }

    pub(crate) fn nodes(&self) -> Vec<DeviceNode> {
        self.nodes
            .values()
            .map(|n| DeviceNode {
                name: n.name.clone(),
                class: self.classes.get(&n.class.0).cloned().unwrap_or_default(),
                number: n.number,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_and_node_lifecycle() {
        let mut reg = ClassRegistry::default();
        let class = reg.class_create("dtsplatled").unwrap();
        let number = DeviceNumber::new(511, 0);
        reg.device_create(class, number, "dtsplatled").unwrap();
        assert_eq!(reg.lookup("dtsplatled"), Some(number));

        assert!(matches!(reg.class_destroy(class), Err(HostError::Busy(_))));
        reg.device_destroy(class, number).unwrap();
        reg.class_destroy(class).unwrap();
        assert!(reg.classes().is_empty());
        assert!(reg.nodes().is_empty());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut reg = ClassRegistry::default();
        let class = reg.class_create("leds").unwrap();
        assert!(matches!(reg.class_create("leds"), Err(HostError::Exists(_))));
        reg.device_create(class, DeviceNumber::new(1, 0), "led0").unwrap();
        assert!(matches!(
            reg.device_create(class, DeviceNumber::new(1, 1), "led0"),
            Err(HostError::Exists(_))
        ));
    }

    #[test]
    fn test_node_under_unknown_class() {
        let mut reg = ClassRegistry::default();
        assert!(matches!(
            reg.device_create(ClassHandle(42), DeviceNumber::new(1, 0), "x"),
            Err(HostError::NotFound(_))
        ));
    }
}
