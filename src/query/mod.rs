pub mod protocols;
pub mod targets;

use std::{net::SocketAddr, time::Duration};

use eyre::{WrapErr, bail, eyre};
use tracing::{debug, info};

use crate::net::UdpTransport;

use self::{
    protocols::{Network, Protocol, ProtocolRegistry, Response},
    targets::Target,
};

pub struct QueryOptions {
    /// Force a protocol by name instead of picking one from the port.
    pub protocol: Option<String>,
    /// Applied to both sending and receiving.
    pub timeout: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            protocol: None,
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
pub struct Queried {
    pub address: SocketAddr,
    pub protocol: &'static str,
    pub response: Response,
}

/// Pick the protocol to use for a target. An explicit name always wins,
/// otherwise the highest priority protocol whose default port matches the
/// target's port, otherwise the highest priority protocol overall.
pub fn select_protocol<'a>(
    registry: &'a ProtocolRegistry,
    name: Option<&str>,
    port: Option<u16>,
) -> eyre::Result<&'a dyn Protocol> {
    if let Some(name) = name {
        return registry
            .by_name(name)
            .ok_or_else(|| eyre!("unknown protocol {name:?}"));
    }
    if let Some(protocol) = port.and_then(|port| registry.by_port(port).next()) {
        return Ok(protocol);
    }
    registry
        .preferred()
        .ok_or_else(|| eyre!("no protocols are registered"))
}

/// Query a single target from start to finish. The socket only lives for the
/// duration of this call.
pub fn query_target(
    registry: &ProtocolRegistry,
    target: &Target,
    options: &QueryOptions,
) -> eyre::Result<Queried> {
    let protocol = select_protocol(registry, options.protocol.as_deref(), target.port)?;
    let protocol_name = protocol.names()[0];

    let address = target.resolve(protocol.default_port())?;
    debug!("querying {target} ({address}) with {protocol_name}");

    let response = match protocol.network() {
        Network::Udp => {
            let mut transport = UdpTransport::connect(address, options.timeout, options.timeout)
                .wrap_err_with(|| format!("couldn't open a socket to {address}"))?;
            protocol
                .execute(&mut transport)
                .wrap_err_with(|| format!("{protocol_name} query to {address} failed"))?
        }
        network => bail!("{protocol_name} needs a {network} transport, which isn't supported"),
    };

    info!("got {protocol_name} response from {target} ({address})");
    Ok(Queried {
        address,
        protocol: protocol_name,
        response,
    })
}
