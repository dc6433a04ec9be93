// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::{MemoryCluster, Result, Store, StoreError};
use diagnostics::info;
use std::fmt;
use std::time::Duration;

/// Where the store lives.
///
/// `memory://` selects a fresh in-process cluster; anything else is a
/// comma-separated list of `host[:port]` contact points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Memory,
    Nodes(Vec<String>),
}

/// Port used when a contact point omits one
pub const DEFAULT_CQL_PORT: u16 = 9042;

impl Endpoint {
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec == "memory" || spec == "memory://" {
            return Ok(Endpoint::Memory);
        }
        if spec.contains("://") {
            return Err(StoreError::InvalidEndpoint(spec.to_string()));
        }

        let mut nodes = Vec::new();
        for node in spec.split(',').map(str::trim) {
            if node.is_empty() {
                return Err(StoreError::InvalidEndpoint(spec.to_string()));
            }
            match node.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                    nodes.push(node.to_string());
                }
                Some(_) => return Err(StoreError::InvalidEndpoint(spec.to_string())),
                None => nodes.push(format!("{node}:{DEFAULT_CQL_PORT}")),
            }
        }
        Ok(Endpoint::Nodes(nodes))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Memory => f.write_str("memory://"),
            Endpoint::Nodes(nodes) => f.write_str(&nodes.join(",")),
        }
    }
}

/// Open a session against `endpoint`.
pub async fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<Box<dyn Store>> {
    let target = endpoint.to_string();
    info!("Connecting to store at {target}", target: target);
    match endpoint {
        Endpoint::Memory => {
            let session = MemoryCluster::new().connect().await?;
            Ok(Box::new(session))
        }
        Endpoint::Nodes(nodes) => connect_nodes(nodes, timeout).await,
    }
}

#[cfg(feature = "cql")]
async fn connect_nodes(nodes: &[String], timeout: Duration) -> Result<Box<dyn Store>> {
    let store = crate::CqlStore::connect(nodes, timeout).await?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "cql"))]
async fn connect_nodes(nodes: &[String], _timeout: Duration) -> Result<Box<dyn Store>> {
    Err(StoreError::Connection(format!(
        "cannot reach {}: built without the `cql` feature",
        nodes.join(",")
    )))
}
