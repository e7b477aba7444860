//! Opportunistic mapping of fan IPs to broadcast device ids.

use std::net::Ipv4Addr;

use log::debug;
use serde::{Deserialize, Serialize};

/// Associates known fan IP slots with the `device_id`s seen in broadcasts.
///
/// Slots are filled first-write-wins in the order the IPs were given. The
/// mapping is advisory: commands are always addressed by IP.
///
/// # Example
///
/// ```
/// use std::net::Ipv4Addr;
/// use atomberg_fans_rs::DeviceRegistry;
///
/// let sofa = Ipv4Addr::new(192, 168, 29, 14);
/// let table = Ipv4Addr::new(192, 168, 29, 15);
/// let mut registry = DeviceRegistry::new([sofa, table]);
///
/// assert_eq!(registry.observe(sofa, "fan-a"), Some(sofa));
/// assert_eq!(registry.observe(table, "fan-b"), Some(table));
/// assert_eq!(registry.device_id(table), Some("fan-b"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceRegistry {
    slots: Vec<(Ipv4Addr, Option<String>)>,
}

impl DeviceRegistry {
    pub fn new(ips: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        let mut slots: Vec<(Ipv4Addr, Option<String>)> = Vec::new();
        for ip in ips {
            if !slots.iter().any(|(known, _)| *known == ip) {
                slots.push((ip, None));
            }
        }
        DeviceRegistry { slots }
    }

    /// Record a `device_id` seen in a broadcast from `source`.
    ///
    /// The first slot that is unassigned or already holds `device_id` takes
    /// it and the scan stops. Returns the slot IP if it was newly assigned.
    pub fn observe(&mut self, source: Ipv4Addr, device_id: &str) -> Option<Ipv4Addr> {
        if device_id.is_empty() {
            return None;
        }

        let (ip, slot) = self
            .slots
            .iter_mut()
            .find(|(_, slot)| slot.as_deref().is_none_or(|id| id == device_id))?;

        if slot.is_some() {
            return None;
        }

        debug!("Device {device_id} (from {source}) assigned to {ip}");
        *slot = Some(device_id.to_string());
        Some(*ip)
    }

    pub fn device_id(&self, ip: Ipv4Addr) -> Option<&str> {
        self.slots
            .iter()
            .find(|(known, _)| *known == ip)
            .and_then(|(_, id)| id.as_deref())
    }

    pub fn ip_for(&self, device_id: &str) -> Option<Ipv4Addr> {
        self.slots
            .iter()
            .find(|(_, id)| id.as_deref() == Some(device_id))
            .map(|(ip, _)| *ip)
    }

    /// Iterate slots in scan order.
    pub fn iter(&self) -> impl Iterator<Item = (Ipv4Addr, Option<&str>)> {
        self.slots.iter().map(|(ip, id)| (*ip, id.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOFA: Ipv4Addr = Ipv4Addr::new(192, 168, 29, 14);
    const TABLE: Ipv4Addr = Ipv4Addr::new(192, 168, 29, 15);

    #[test]
    fn test_empty_device_id_is_ignored() {
        let mut registry = DeviceRegistry::new([SOFA]);
        assert_eq!(registry.observe(SOFA, ""), None);
        assert_eq!(registry.device_id(SOFA), None);
    }

    #[test]
    fn test_first_free_slot_wins() {
        let mut registry = DeviceRegistry::new([SOFA, TABLE]);
        // The scan order decides the slot, not the source address.
        assert_eq!(registry.observe(TABLE, "fan-a"), Some(SOFA));
        assert_eq!(registry.device_id(SOFA), Some("fan-a"));
        assert_eq!(registry.device_id(TABLE), None);
    }

    #[test]
    fn test_known_id_stops_the_scan() {
        let mut registry = DeviceRegistry::new([SOFA, TABLE]);
        registry.observe(SOFA, "fan-a");
        assert_eq!(registry.observe(SOFA, "fan-a"), None);
        assert_eq!(registry.device_id(TABLE), None);

        assert_eq!(registry.observe(TABLE, "fan-b"), Some(TABLE));
        assert_eq!(registry.ip_for("fan-b"), Some(TABLE));
    }

    #[test]
    fn test_full_registry_keeps_first_writes() {
        let mut registry = DeviceRegistry::new([SOFA, TABLE]);
        registry.observe(SOFA, "fan-a");
        registry.observe(TABLE, "fan-b");
        assert_eq!(registry.observe(TABLE, "fan-c"), None);
        assert_eq!(registry.ip_for("fan-c"), None);
        assert_eq!(
            registry.iter().collect::<Vec<_>>(),
            vec![(SOFA, Some("fan-a")), (TABLE, Some("fan-b"))]
        );
    }

    #[test]
    fn test_duplicate_ips_collapse() {
        let registry = DeviceRegistry::new([SOFA, SOFA, TABLE]);
        assert_eq!(registry.len(), 2);
        assert!(DeviceRegistry::default().is_empty());
    }
}
