use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use clap::{Arg, Command};

use system::node::Node;
use system::runtime;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let azimuth = Command::new("azimuth")
        .arg(
            Arg::new("address")
                .long("address")
                .takes_value(true)
                .default_value("127.0.0.1"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .takes_value(true)
                .default_value("9001"),
        )
        .arg(
            Arg::new("peers")
                .long("peers")
                .takes_value(true)
                .multiple_values(true)
                .required(false),
        )
        .get_matches();

    let address = IpAddr::from_str(azimuth.value_of("address").unwrap_or("127.0.0.1"))?;
    let port = u16::from_str(azimuth.value_of("port").unwrap_or("9001"))?;

    let mut peers = Vec::with_capacity(5);

    if let Some(values) = azimuth.values_of("peers") {
        for value in values {
            peers.push(SocketAddr::from_str(value)?);
        }
    }

    let node = Node::init(address, port).await?;

    runtime::launch(node, peers).await?;

    Ok(())
}
