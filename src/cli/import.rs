//! Handler for the `import` command.

use crate::cli::{output, ImportArgs};
use crate::config::Config;
use crate::error::Result;
use crate::session::SealedSessionCodec;
use crate::vault::Vault;

/// Execute the import command: complete a manual handshake.
pub fn execute(config: &Config, args: &ImportArgs) -> Result<()> {
    let vault = Vault::open(config.data_dir());

    let ciphertext = match &args.ciphertext {
        Some(ciphertext) => ciphertext.clone(),
        None => dialoguer::Input::<String>::new()
            .with_prompt("Ciphertext")
            .interact_text()?,
    };

    let session = SealedSessionCodec::new(&vault).bind(&args.request.to_string(), &ciphertext)?;

    if session.wallet != args.wallet {
        output::warn(&format!(
            "Request was created for wallet '{}', not '{}'; session stored under '{}'",
            session.wallet, args.wallet, session.wallet
        ));
    }
    output::ok(&format!(
        "Session bound: wallet '{}' at {} on {}",
        session.wallet, session.address, session.chain
    ));
    Ok(())
}
