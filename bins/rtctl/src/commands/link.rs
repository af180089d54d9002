//! rtctl link - interface cache.

use clap::{Args, Subcommand};
use rtlink::Session;
use rtlink::netlink::InterfaceEntry;

use super::Output;

#[derive(Args)]
pub struct LinkCmd {
    #[command(subcommand)]
    action: Option<LinkAction>,
}

#[derive(Subcommand)]
enum LinkAction {
    /// Show interfaces.
    Show {
        /// Interface name.
        dev: Option<String>,
    },
}

impl LinkCmd {
    pub fn run(self, session: &Session, output: Output) -> anyhow::Result<()> {
        let LinkAction::Show { dev } = self.action.unwrap_or(LinkAction::Show { dev: None });

        let links: Vec<InterfaceEntry> = match dev {
            Some(name) => {
                let index = session
                    .interface_index(&name)
                    .ok_or_else(|| anyhow::anyhow!("interface \"{}\" not found", name))?;
                session.interface(index).into_iter().collect()
            }
            None => session.interfaces(),
        };

        if output.json {
            return output.print_json(&links);
        }
        for link in &links {
            println!("{}: {}: mtu {}", link.index, link.name, link.mtu);
            println!("    link/ether {}", link.mac_str);
        }
        Ok(())
    }
}
