//! rtctl address - assign and remove interface addresses.

use clap::{Args, Subcommand};
use ipnet::IpNet;
use rtlink::Session;

#[derive(Args)]
pub struct AddressCmd {
    #[command(subcommand)]
    action: AddressAction,
}

#[derive(Subcommand)]
enum AddressAction {
    /// Add an address, waiting briefly for the interface to appear.
    Add {
        /// Address with prefix length (e.g. 10.147.17.5/24).
        address: IpNet,

        /// Interface name.
        #[arg(long, short)]
        dev: String,
    },

    /// Remove an address.
    #[command(visible_alias = "delete")]
    Del {
        /// Address with prefix length.
        address: IpNet,

        /// Interface name.
        #[arg(long, short)]
        dev: String,
    },
}

impl AddressCmd {
    pub async fn run(self, session: &Session) -> anyhow::Result<()> {
        match self.action {
            AddressAction::Add { address, dev } => session.add_address(address, &dev).await?,
            AddressAction::Del { address, dev } => session.remove_address(address, &dev).await?,
        }
        Ok(())
    }
}
