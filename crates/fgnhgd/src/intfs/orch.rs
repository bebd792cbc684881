//! Router interface orchestration logic.

use log::info;
use sonic_orch_common::RefTable;
use sonic_sai::RouterInterfaceOid;

/// Base of the id space used for router-interface handles.
const RIF_OID_BASE: u64 = 0x6000_0000_0000;

/// The router interface table: alias -> RIF handle, with a reference
/// count for the routes currently pointing at each interface.
pub struct IntfsOrch {
    interfaces: RefTable<String, RouterInterfaceOid>,
    rif_seq: u64,
}

impl IntfsOrch {
    /// Creates an empty interface table.
    pub fn new() -> Self {
        Self {
            interfaces: RefTable::new(),
            rif_seq: 0,
        }
    }

    /// Creates a router interface for the alias, allocating its handle.
    ///
    /// Adding a known alias keeps the existing handle.
    pub fn add_router_interface(&mut self, alias: impl Into<String>) -> RouterInterfaceOid {
        let alias = alias.into();
        if let Some(rif_id) = self.interfaces.get(&alias) {
            return *rif_id;
        }

        self.rif_seq += 1;
        let rif_id = RouterInterfaceOid::from_raw_unchecked(RIF_OID_BASE + self.rif_seq);
        info!("Router interface {} created, rif id {}", alias, rif_id);
        self.interfaces.insert(alias, rif_id);
        rif_id
    }

    /// Returns the router-interface handle for an alias, or the null id.
    pub fn router_intfs_id(&self, alias: &str) -> RouterInterfaceOid {
        self.interfaces
            .get(&alias.to_string())
            .copied()
            .unwrap_or(RouterInterfaceOid::NULL)
    }

    /// Takes a reference on an interface (a route now points at it).
    pub fn increase_router_intfs_ref_count(&mut self, alias: &str) {
        let _ = self.interfaces.acquire(&alias.to_string());
    }

    /// Drops a route reference on an interface.
    pub fn decrease_router_intfs_ref_count(&mut self, alias: &str) {
        let _ = self.interfaces.release(&alias.to_string());
    }
}

impl Default for IntfsOrch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rif_lookup() {
        let mut orch = IntfsOrch::new();
        assert!(orch.router_intfs_id("Ethernet0").is_null());

        let rif = orch.add_router_interface("Ethernet0");
        assert!(rif.is_valid());
        assert_eq!(orch.router_intfs_id("Ethernet0"), rif);

        // Re-adding keeps the handle
        assert_eq!(orch.add_router_interface("Ethernet0"), rif);
    }
}
