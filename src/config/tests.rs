// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Unit tests for configuration module

#[cfg(test)]
mod test {
    use super::super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_addr, "0.0.0.0:3000");
        assert_eq!(config.topology_interval_secs, 900);
        assert_eq!(config.lease.lease_seconds, 3600);
        assert_eq!(config.lease.dns, vec![Ipv4Addr::new(8, 8, 8, 8)]);
        assert_eq!(config.lease.fake.ip, Ipv4Addr::new(140, 117, 1, 1));
        assert!(config.enable_http && config.enable_topology_builder && config.enable_port_verifier);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_vars() {
        let config = from_vars(&[
            ("SERVER_ADDR", "127.0.0.1:8080"),
            ("REDIS_URL", "redis://cache:6379"),
            ("TOPOLOGY_INTERVAL_SECONDS", "60"),
            ("DHCP_LEASE_SECONDS", "7200"),
            ("DHCP_DNS", "1.1.1.1, 9.9.9.9"),
            ("FAKE_LEASE_IP", "192.0.2.1"),
            ("ENABLE_HTTP", "false"),
            ("DHCP_EVENTS", "0"),
        ]);
        assert_eq!(config.server_addr, "127.0.0.1:8080");
        assert_eq!(config.redis_url, "redis://cache:6379");
        assert_eq!(config.topology_interval(), Duration::from_secs(60));
        assert_eq!(config.lease.lease_seconds, 7200);
        assert_eq!(
            config.lease.dns,
            vec![Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(9, 9, 9, 9)]
        );
        assert_eq!(config.lease.fake.ip, Ipv4Addr::new(192, 0, 2, 1));
        assert_eq!(config.lease.fake.router, Ipv4Addr::new(140, 117, 1, 2));
        assert!(!config.enable_http);
        assert!(!config.engine_config().publish_events);
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = from_vars(&[
            ("TOPOLOGY_INTERVAL_SECONDS", "soon"),
            ("DHCP_DNS", "8.8.8.8,not-an-ip"),
            ("ENABLE_PORT_VERIFIER", "maybe"),
        ]);
        assert_eq!(config.topology_interval_secs, 900);
        assert_eq!(config.lease.dns, vec![Ipv4Addr::new(8, 8, 8, 8)]);
        assert!(config.enable_port_verifier);
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        assert!(from_vars(&[("TOPOLOGY_INTERVAL_SECONDS", "0")]).validate().is_err());
        assert!(from_vars(&[("DHCP_LEASE_SECONDS", "0")]).validate().is_err());
        assert!(from_vars(&[("DHCP_DNS", " ")]).validate().is_err());
        assert!(
            from_vars(&[
                ("ENABLE_HTTP", "no"),
                ("ENABLE_TOPOLOGY_BUILDER", "no"),
                ("ENABLE_PORT_VERIFIER", "no"),
            ])
            .validate()
            .is_err()
        );
    }
}
