//! Network and application configuration.

use zncp_protocol::{
    DeviceType, Latency, ModuleError, SecurityMode, ANY_CHANNEL_MASK, ANY_PAN, MAX_PAN_ID,
};

/// Most endpoints the application framework accepts per direction
/// when registering clusters for binding.
pub const MAX_BINDING_CLUSTERS: usize = 4;

/// Highest endpoint number available to applications.
pub const MAX_ENDPOINT: u8 = 0xF0;

/// How the module joins or forms a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Role to configure before starting the stack.
    pub device_type: DeviceType,
    /// Channels to form on or scan, as a bitmask of channels 11–25.
    pub channel_mask: u32,
    /// PAN to form or join; [`ANY_PAN`] joins whatever is found.
    pub pan_id: u16,
    /// Data-request poll interval, used by end devices only.
    pub poll_rate_ms: u16,
    /// Radio transmit power to request, if any.
    pub tx_power_dbm: Option<i8>,
    pub security_mode: SecurityMode,
    /// Network key, required when security uses preconfigured keys.
    pub security_key: Option<[u8; 16]>,
}

impl ModuleConfig {
    fn with_type(device_type: DeviceType) -> Self {
        ModuleConfig {
            device_type,
            channel_mask: ANY_CHANNEL_MASK,
            pan_id: ANY_PAN,
            poll_rate_ms: 2000,
            tx_power_dbm: None,
            security_mode: SecurityMode::Off,
            security_key: None,
        }
    }

    /// Form a new network on any permitted channel.
    pub fn coordinator() -> Self {
        ModuleConfig::with_type(DeviceType::Coordinator)
    }

    /// Join an existing network and route for others.
    pub fn router() -> Self {
        ModuleConfig::with_type(DeviceType::Router)
    }

    /// Join an existing network as a sleepy leaf.
    pub fn end_device() -> Self {
        ModuleConfig::with_type(DeviceType::EndDevice)
    }

    /// Check internal consistency before any of it is written to the
    /// module.
    pub fn validate(&self) -> Result<(), ModuleError> {
        if self.channel_mask == 0 || self.channel_mask & !ANY_CHANNEL_MASK != 0 {
            return Err(ModuleError::InvalidParameter);
        }
        if self.pan_id > MAX_PAN_ID && self.pan_id != ANY_PAN {
            return Err(ModuleError::InvalidParameter);
        }
        if self.security_mode != SecurityMode::Off && self.security_key.is_none() {
            return Err(ModuleError::InvalidParameter);
        }
        Ok(())
    }
}

/// The application endpoint registered with the module.
///
/// The defaults describe a generic data-pipe application: one endpoint,
/// one cluster in each direction, private profile. Two modules with
/// the default configuration can exchange application messages with no
/// further setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationConfig {
    pub endpoint: u8,
    pub profile_id: u16,
    pub device_id: u16,
    pub device_version: u8,
    pub latency: Latency,
    /// Clusters this endpoint can receive on, for binding.
    pub input_clusters: Vec<u16>,
    /// Clusters this endpoint sends on, for binding.
    pub output_clusters: Vec<u16>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        ApplicationConfig {
            endpoint: 0xD7,
            profile_id: 0xD7D7,
            device_id: 0x4567,
            device_version: 0x89,
            latency: Latency::Normal,
            input_clusters: vec![0x0007],
            output_clusters: vec![0x0007],
        }
    }
}

impl ApplicationConfig {
    pub fn validate(&self) -> Result<(), ModuleError> {
        if self.endpoint == 0 || self.endpoint > MAX_ENDPOINT {
            return Err(ModuleError::InvalidParameter);
        }
        if self.input_clusters.len() > MAX_BINDING_CLUSTERS {
            return Err(ModuleError::InvalidLength {
                max: MAX_BINDING_CLUSTERS,
                actual: self.input_clusters.len(),
            });
        }
        if self.output_clusters.len() > MAX_BINDING_CLUSTERS {
            return Err(ModuleError::InvalidLength {
                max: MAX_BINDING_CLUSTERS,
                actual: self.output_clusters.len(),
            });
        }
        if self
            .input_clusters
            .iter()
            .chain(&self.output_clusters)
            .any(|&cluster| cluster == 0)
        {
            return Err(ModuleError::InvalidCluster);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert_eq!(ModuleConfig::coordinator().validate(), Ok(()));
        assert_eq!(ApplicationConfig::default().validate(), Ok(()));
    }

    #[test]
    fn channel_26_is_rejected() {
        let mut config = ModuleConfig::router();
        config.channel_mask = 1 << 26;
        assert_eq!(config.validate(), Err(ModuleError::InvalidParameter));
    }

    #[test]
    fn security_requires_a_key() {
        let mut config = ModuleConfig::coordinator();
        config.security_mode = SecurityMode::PreconfiguredKeys;
        assert_eq!(config.validate(), Err(ModuleError::InvalidParameter));
        config.security_key = Some([0xAA; 16]);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn zero_cluster_is_rejected() {
        let config = ApplicationConfig {
            input_clusters: vec![0x0007, 0x0000],
            ..ApplicationConfig::default()
        };
        assert_eq!(config.validate(), Err(ModuleError::InvalidCluster));
    }

    #[test]
    fn too_many_clusters_are_rejected() {
        let config = ApplicationConfig {
            output_clusters: vec![1, 2, 3, 4, 5],
            ..ApplicationConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ModuleError::InvalidLength { max: 4, actual: 5 })
        );
    }
}
