use std::net::SocketAddr;

use tokio::signal::ctrl_c;
use tokio::time::Duration;

use crate::member::Member;
use crate::node::Node;
use crate::{error, info};

pub const PROTOCOL_PERIOD: Duration = Duration::from_secs(5);
pub const SUSPICION_PERIOD: Duration = Duration::from_secs(15);
pub const RESPONSE_GRACE: Duration = Duration::from_millis(50);

pub async fn launch(
    node: Node,
    peers: Vec<SocketAddr>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("node id -> {:?}", &node.id);
    info!("listening address -> {:?}", &node.socket_address().await);

    // -------------------------------------------------------------------------------------------
    // |        init member
    // -------------------------------------------------------------------------------------------

    let mut member = Member::init(node, PROTOCOL_PERIOD, SUSPICION_PERIOD, RESPONSE_GRACE).await?;

    member.launch().await?;

    // -------------------------------------------------------------------------------------------
    // |        static join
    // -------------------------------------------------------------------------------------------

    if !peers.is_empty() {
        info!("joining configured peers -> {:?}", &peers);

        member.join(peers).await?;
    }

    // -------------------------------------------------------------------------------------------
    // |        await shutdown signal
    // -------------------------------------------------------------------------------------------

    let signal = ctrl_c().await;

    info!("received shutdown signal {:?}", signal);
    info!("preparing to shut down...");

    if let Err(shutdown_error) = member.shutdown().await {
        error!("member shutdown -> {:?}", shutdown_error);
    }

    Ok(())
}
