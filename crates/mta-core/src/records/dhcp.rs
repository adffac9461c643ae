//! DHCP/DHCPv6 lease records and provisioning parameters

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};

use super::bounded::{BoundedString, LongValue};

/// Textual IPv6 prefix, sized like `INET6_ADDRSTRLEN`
pub type Inet6Text = BoundedString<46>;

/// IPv4 lease acquired by the MTA DHCP client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpV4Lease {
    pub ip_address: Ipv4Addr,
    pub boot_file_name: LongValue,
    pub fqdn: LongValue,
    pub subnet_mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub lease_time_remaining: u64,
    pub rebind_time_remaining: u64,
    pub renew_time_remaining: u64,
    pub primary_dns: Ipv4Addr,
    pub secondary_dns: Ipv4Addr,
    pub dhcp_option3: LongValue,
    pub dhcp_option6: LongValue,
    pub dhcp_option7: LongValue,
    pub dhcp_option8: LongValue,
    pub pc_version: LongValue,
    pub mac_address: LongValue,
    pub primary_dhcp_server: Ipv4Addr,
    pub secondary_dhcp_server: Ipv4Addr,
}

impl DhcpV4Lease {
    /// Minimal lease; remaining fields are unspecified/empty
    pub fn new(ip_address: Ipv4Addr, lease_time_remaining: u64) -> Self {
        Self {
            ip_address,
            boot_file_name: LongValue::default(),
            fqdn: LongValue::default(),
            subnet_mask: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::UNSPECIFIED,
            lease_time_remaining,
            rebind_time_remaining: 0,
            renew_time_remaining: 0,
            primary_dns: Ipv4Addr::UNSPECIFIED,
            secondary_dns: Ipv4Addr::UNSPECIFIED,
            dhcp_option3: LongValue::default(),
            dhcp_option6: LongValue::default(),
            dhcp_option7: LongValue::default(),
            dhcp_option8: LongValue::default(),
            pc_version: LongValue::default(),
            mac_address: LongValue::default(),
            primary_dhcp_server: Ipv4Addr::UNSPECIFIED,
            secondary_dhcp_server: Ipv4Addr::UNSPECIFIED,
        }
    }
}

/// IPv6 lease acquired by the MTA DHCPv6 client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpV6Lease {
    pub ipv6_address: Ipv6Addr,
    pub boot_file_name: LongValue,
    pub fqdn: LongValue,
    pub prefix: Inet6Text,
    pub gateway: Ipv6Addr,
    pub lease_time_remaining: u64,
    pub rebind_time_remaining: u64,
    pub renew_time_remaining: u64,
    pub primary_dns: Ipv6Addr,
    pub secondary_dns: Ipv6Addr,
    pub dhcp_option3: LongValue,
    pub dhcp_option6: LongValue,
    pub dhcp_option7: LongValue,
    pub dhcp_option8: LongValue,
    pub pc_version: LongValue,
    pub mac_address: LongValue,
    pub primary_dhcpv6_server: Ipv6Addr,
    pub secondary_dhcpv6_server: Ipv6Addr,
}

impl DhcpV6Lease {
    /// Minimal lease; remaining fields are unspecified/empty
    pub fn new(ipv6_address: Ipv6Addr, lease_time_remaining: u64) -> Self {
        Self {
            ipv6_address,
            boot_file_name: LongValue::default(),
            fqdn: LongValue::default(),
            prefix: Inet6Text::default(),
            gateway: Ipv6Addr::UNSPECIFIED,
            lease_time_remaining,
            rebind_time_remaining: 0,
            renew_time_remaining: 0,
            primary_dns: Ipv6Addr::UNSPECIFIED,
            secondary_dns: Ipv6Addr::UNSPECIFIED,
            dhcp_option3: LongValue::default(),
            dhcp_option6: LongValue::default(),
            dhcp_option7: LongValue::default(),
            dhcp_option8: LongValue::default(),
            pc_version: LongValue::default(),
            mac_address: LongValue::default(),
            primary_dhcpv6_server: Ipv6Addr::UNSPECIFIED,
            secondary_dhcpv6_server: Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Address families the MTA provisions over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpMode {
    Ipv4,
    Ipv6,
    DualStack,
}

impl IpMode {
    pub fn includes_v4(self) -> bool {
        matches!(self, IpMode::Ipv4 | IpMode::DualStack)
    }

    pub fn includes_v6(self) -> bool {
        matches!(self, IpMode::Ipv6 | IpMode::DualStack)
    }
}

/// Parameters handed to `start_provisioning`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningParams {
    pub ip_mode: IpMode,
    /// DHCP option 122 sub-option 1 (primary DHCP server)
    pub option122_suboption1: BoundedString<4>,
    /// DHCP option 122 sub-option 2 (secondary DHCP server)
    pub option122_suboption2: BoundedString<4>,
    /// DHCPv6 option 2171 CCCv6 DSS ID 1
    pub option2171_dss_id1: BoundedString<32>,
    /// DHCPv6 option 2171 CCCv6 DSS ID 2
    pub option2171_dss_id2: BoundedString<32>,
}

impl ProvisioningParams {
    pub fn new(ip_mode: IpMode) -> Self {
        Self {
            ip_mode,
            option122_suboption1: BoundedString::default(),
            option122_suboption2: BoundedString::default(),
            option2171_dss_id1: BoundedString::default(),
            option2171_dss_id2: BoundedString::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_mode_families() {
        assert!(IpMode::DualStack.includes_v4() && IpMode::DualStack.includes_v6());
        assert!(IpMode::Ipv4.includes_v4() && !IpMode::Ipv4.includes_v6());
        assert!(!IpMode::Ipv6.includes_v4() && IpMode::Ipv6.includes_v6());
    }

    #[test]
    fn test_params_reject_oversized_suboption() {
        let json = r#"{
            "ip_mode": "dual_stack",
            "option122_suboption1": "12345",
            "option122_suboption2": "",
            "option2171_dss_id1": "",
            "option2171_dss_id2": ""
        }"#;
        assert!(serde_json::from_str::<ProvisioningParams>(json).is_err());
    }
}
