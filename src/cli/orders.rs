//! Handler for the `orders` command.

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::{output, OrdersArgs};
use crate::config::Config;
use crate::error::Result;
use crate::session::WalletSession;
use crate::vault::Vault;
use crate::venue::{OpenOrder, SigningIdentity, VenueApi as _, VenueClient};

#[derive(Tabled)]
struct OrderRow {
    #[tabled(rename = "Order")]
    id: String,
    #[tabled(rename = "Market")]
    market: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Side")]
    side: String,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Matched")]
    matched: String,
}

impl From<OpenOrder> for OrderRow {
    fn from(order: OpenOrder) -> Self {
        Self {
            id: order.id,
            market: order.market,
            outcome: order.outcome,
            side: order.side,
            price: order.price,
            size: order.original_size,
            matched: order.size_matched,
        }
    }
}

/// Execute the orders command: list resting orders, or cancel one.
pub async fn execute(config: &Config, args: &OrdersArgs) -> Result<()> {
    let vault = Vault::open(config.data_dir());
    let session = WalletSession::load(&vault, &args.wallet)?;
    let delegate_key = session.require_delegate_key()?;

    let identity = SigningIdentity::from_hex(delegate_key, session.chain_id)?;
    let venue = VenueClient::new(&config.venue.api_url);
    let (credential, _) = venue.derive_credential(&identity).await?;

    if let Some(order_id) = &args.cancel {
        venue.cancel_order(&credential, order_id).await?;
        output::ok(&format!("Order {order_id} cancelled"));
        return Ok(());
    }

    let orders = venue.open_orders(&credential).await?;
    if orders.is_empty() {
        output::note("No resting orders");
        return Ok(());
    }

    let rows: Vec<OrderRow> = orders.into_iter().map(OrderRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{table}");
    Ok(())
}
