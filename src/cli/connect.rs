//! Handler for the `connect` command.

use std::time::Duration;

use tracing::info;

use crate::cli::{output, ConnectArgs};
use crate::config::Config;
use crate::error::Result;
use crate::session::{CallbackListener, RequestBroker, SealedSessionCodec, Tunnel};
use crate::vault::Vault;

/// Execute the connect command.
pub async fn execute(config: &Config, args: &ConnectArgs) -> Result<()> {
    let vault = Vault::open(config.data_dir());
    let chain = args.chain.unwrap_or(config.chain);
    let constraints = args.constraints()?;
    let broker = RequestBroker::new(&vault, &config.approver.approve_url);

    if args.manual {
        let ticket =
            broker.create_request(&args.wallet, chain, &constraints, args.token.clone(), None)?;

        output::section("Approval request");
        output::key_value("Request", ticket.request_id);
        output::key_value("Expires", ticket.expires_at.to_rfc3339());
        output::note("Open this link in the wallet holder's browser:");
        output::note(ticket.approval_url.as_str());
        println!();
        output::note(&format!(
            "Then complete with: sidekey import {} --request {}",
            args.wallet, ticket.request_id
        ));
        return Ok(());
    }

    // Wait mode: loopback listener, best-effort public tunnel
    let listener = CallbackListener::bind().await?;
    let tunnel = Tunnel::establish(listener.port()).await;
    let callback_url = tunnel
        .as_ref()
        .ok()
        .map(|tunnel| format!("{}{}", tunnel.public_url, listener.callback_path()));

    let ticket = broker.create_request(
        &args.wallet,
        chain,
        &constraints,
        args.token.clone(),
        callback_url.as_deref(),
    )?;

    output::section("Approval request");
    output::key_value("Request", ticket.request_id);
    output::key_value("Expires", ticket.expires_at.to_rfc3339());
    output::note("Open this link in the wallet holder's browser:");
    output::note(ticket.approval_url.as_str());
    println!();

    let timeout = Duration::from_secs(args.timeout.unwrap_or(config.handshake.wait_timeout_secs));
    let ciphertext = match tunnel {
        Ok(tunnel) => {
            output::note(&format!(
                "Waiting up to {}s for approval...",
                timeout.as_secs()
            ));
            let received = listener.wait(timeout).await;
            tunnel.shutdown().await;
            received?
        }
        Err(e) => {
            output::warn(&format!("{e}"));
            output::note("Paste the ciphertext shown on the approval page instead:");
            drop(listener);
            dialoguer::Input::<String>::new()
                .with_prompt("Ciphertext")
                .interact_text()?
        }
    };

    info!(request_id = %ticket.request_id, "Approval payload received");
    let session =
        SealedSessionCodec::new(&vault).bind(&ticket.request_id.to_string(), &ciphertext)?;

    output::ok(&format!(
        "Session bound: wallet '{}' at {} on {}",
        session.wallet, session.address, session.chain
    ));
    Ok(())
}
