// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    fs,
    net::{IpAddr, Ipv4Addr},
    path::Path,
    time::Duration,
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// Top-level runtime configuration for a node.
///
/// Grouped into logical sub-structs the way iSCSI login parameters were
/// grouped into `Identity`/`Auth`/`Flow`/etc. in the client this engine was
/// derived from.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// TCP/UDP ports and the multicast group this node joins.
    pub network: Network,
    /// Thread/worker counts for each component.
    pub threads: Threads,
    /// Timeouts governing suspension points across the engine.
    pub timeouts: Timeouts,
    /// Size limits enforced by the wire layer.
    pub limits: Limits,
}

/// Network endpoints this node binds to or dials.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Network {
    #[serde(default = "defaults::outward_port")]
    /// Port external clients connect to.
    pub outward_port: u16,
    #[serde(default = "defaults::inward_port")]
    /// Port other cluster nodes connect to.
    pub inward_port: u16,
    #[serde(default = "defaults::status_port")]
    /// Port the demo status/HTTP surface binds to (engine does not use it
    /// directly).
    pub status_port: u16,
    #[serde(default = "defaults::multicast_group")]
    /// Multicast group address nodes announce and fan out on.
    pub multicast_group: Ipv4Addr,
    #[serde(default = "defaults::multicast_port")]
    /// UDP port the multicast group is joined on.
    pub multicast_port: u16,
    #[serde(default)]
    /// Peers to dial eagerly at startup (inward mesh seed list).
    pub seed_peers: Vec<IpAddr>,
}

/// Thread / concurrency knobs.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Threads {
    #[serde(default = "defaults::server_threads")]
    /// Acceptor-side thread count for the outward TCP surface (informational;
    /// the reactor here is a single tokio runtime, mirrored as a concurrency
    /// cap on accepted connections).
    pub outward_server_threads: usize,
    #[serde(default = "defaults::server_threads")]
    /// Acceptor-side thread count for the inward TCP surface.
    pub inward_server_threads: usize,
    #[serde(default = "defaults::client_pool_threads")]
    /// Control-loop concurrency for the inward client pool.
    pub inward_client_pool_threads: usize,
    #[serde(default = "defaults::worker_pool_size")]
    /// Number of workers draining the dispatch queue.
    pub worker_pool_size: usize,
}

/// Timeouts for the suspension points named in the concurrency model.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Timeouts {
    #[serde(default = "defaults::sync_call_timeout", with = "serde_millis")]
    /// Default timeout a sync call waits before `connection_time_out`.
    pub sync_call_timeout: Duration,
    #[serde(default = "defaults::client_pool_stop_drain", with = "serde_millis")]
    /// Maximum time `InwardClientPool::stop` waits for the connection pool to
    /// drain.
    pub client_pool_stop_drain: Duration,
    #[serde(default = "defaults::multicast_recv_timeout", with = "serde_millis")]
    /// Multicast receiver socket recv timeout (allows graceful stop without
    /// signals).
    pub multicast_recv_timeout: Duration,
}

/// Size limits enforced by the framer and multicast endpoint.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Limits {
    #[serde(default = "defaults::multicast_datagram_cap")]
    /// Largest frame size that may be sent over multicast.
    pub multicast_datagram_cap: usize,
    #[serde(default = "defaults::multicast_socket_buf")]
    /// Send/receive socket buffer size for the multicast endpoint.
    pub multicast_socket_buf: usize,
}

mod defaults {
    use std::{net::Ipv4Addr, time::Duration};

    pub fn outward_port() -> u16 {
        9100
    }

    pub fn inward_port() -> u16 {
        9101
    }

    pub fn status_port() -> u16 {
        9190
    }

    pub fn multicast_group() -> Ipv4Addr {
        Ipv4Addr::new(234, 1, 1, 18)
    }

    pub fn multicast_port() -> u16 {
        1234
    }

    pub fn server_threads() -> usize {
        4
    }

    pub fn client_pool_threads() -> usize {
        2
    }

    pub fn worker_pool_size() -> usize {
        8
    }

    pub fn sync_call_timeout() -> Duration {
        Duration::from_secs(5)
    }

    pub fn client_pool_stop_drain() -> Duration {
        Duration::from_secs(30)
    }

    pub fn multicast_recv_timeout() -> Duration {
        Duration::from_secs(2)
    }

    pub fn multicast_datagram_cap() -> usize {
        3584 // 3.5 KiB
    }

    pub fn multicast_socket_buf() -> usize {
        225_280 // 220 KiB
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network {
                outward_port: defaults::outward_port(),
                inward_port: defaults::inward_port(),
                status_port: defaults::status_port(),
                multicast_group: defaults::multicast_group(),
                multicast_port: defaults::multicast_port(),
                seed_peers: Vec::new(),
            },
            threads: Threads {
                outward_server_threads: defaults::server_threads(),
                inward_server_threads: defaults::server_threads(),
                inward_client_pool_threads: defaults::client_pool_threads(),
                worker_pool_size: defaults::worker_pool_size(),
            },
            timeouts: Timeouts {
                sync_call_timeout: defaults::sync_call_timeout(),
                client_pool_stop_drain: defaults::client_pool_stop_drain(),
                multicast_recv_timeout: defaults::multicast_recv_timeout(),
            },
            limits: Limits {
                multicast_datagram_cap: defaults::multicast_datagram_cap(),
                multicast_socket_buf: defaults::multicast_socket_buf(),
            },
        }
    }
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants that must hold before the node starts.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(
            self.threads.outward_server_threads >= 1,
            "outward_server_threads must be >= 1"
        );
        ensure!(
            self.threads.inward_server_threads >= 1,
            "inward_server_threads must be >= 1"
        );
        ensure!(
            self.threads.inward_client_pool_threads >= 1,
            "inward_client_pool_threads must be >= 1"
        );
        ensure!(
            self.threads.worker_pool_size >= 1,
            "worker_pool_size must be >= 1"
        );
        ensure!(self.network.outward_port != 0, "outward_port must be non-zero");
        ensure!(self.network.inward_port != 0, "inward_port must be non-zero");
        ensure!(
            self.network.outward_port != self.network.inward_port,
            "outward_port and inward_port must differ"
        );
        ensure!(
            self.network.multicast_group.is_multicast(),
            "multicast_group must be a valid multicast-range IPv4 address"
        );
        ensure!(
            self.limits.multicast_datagram_cap > 0,
            "multicast_datagram_cap must be > 0"
        );
        Ok(())
    }
}

/// Serde helper for representing `Duration` as a number of milliseconds.
mod serde_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let mut cfg = Config::default();
        cfg.validate_and_normalize().expect("defaults must validate");
    }

    #[test]
    fn rejects_non_multicast_group() {
        let mut cfg = Config::default();
        cfg.network.multicast_group = Ipv4Addr::new(10, 0, 0, 1);
        assert!(cfg.validate_and_normalize().is_err());
    }

    #[test]
    fn rejects_equal_ports() {
        let mut cfg = Config::default();
        cfg.network.inward_port = cfg.network.outward_port;
        assert!(cfg.validate_and_normalize().is_err());
    }

    #[test]
    fn rejects_zero_worker_pool() {
        let mut cfg = Config::default();
        cfg.threads.worker_pool_size = 0;
        assert!(cfg.validate_and_normalize().is_err());
    }
}
