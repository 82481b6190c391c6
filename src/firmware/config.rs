pub const SYSCLK_HZ: u32 = 170_000_000;
pub const HEARTBEAT_PERIOD_SECS: u64 = 1;

/// Board-level layout: how many physical packs this controller instance
/// drives, and the I2C/CAN addressing for each. `marine_ess_core::Tunables`
/// covers everything pack-internal (thresholds, delays, topology); this is
/// the one additional layer the core doesn't know about.
#[derive(Clone, Copy, Debug)]
pub struct BoardConfig {
    pub n_packs: u8,
    pub can_node_id: u16,
    /// I2C bus address of module 0 of pack 0; modules and packs are
    /// addressed contiguously from there.
    pub first_module_i2c_addr: u8,
}

impl BoardConfig {
    pub const fn default() -> Self {
        Self {
            n_packs: 3,
            can_node_id: 0x100,
            first_module_i2c_addr: 0x08,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_config_defaults() {
        let cfg = BoardConfig::default();
        assert_eq!(cfg.n_packs, 3);
        assert_eq!(cfg.can_node_id, 0x100);
    }
}
