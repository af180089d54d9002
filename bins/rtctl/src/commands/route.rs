//! rtctl route - main table snapshot and route changes.

use std::net::IpAddr;

use clap::{Args, Subcommand};
use ipnet::IpNet;
use rtlink::netlink::RouteEntry;
use rtlink::{Route, Session};

use super::Output;

#[derive(Args)]
pub struct RouteCmd {
    #[command(subcommand)]
    action: Option<RouteAction>,
}

#[derive(Args)]
struct RouteSpec {
    /// Destination prefix (e.g. 10.0.0.0/8, or 0.0.0.0/0 for default).
    destination: IpNet,

    /// Gateway address.
    #[arg(long, short)]
    via: Option<IpAddr>,

    /// Output device.
    #[arg(long, short)]
    dev: Option<String>,

    /// Source prefix, ignored when a gateway is given.
    #[arg(long)]
    src: Option<IpNet>,
}

impl RouteSpec {
    fn to_route(&self) -> Route {
        let mut route = Route::new().destination(self.destination);
        if let Some(via) = self.via {
            route = route.gateway(via);
        }
        if let Some(src) = self.src {
            route = route.source(src);
        }
        if let Some(dev) = &self.dev {
            route = route.interface(dev.as_str());
        }
        route
    }
}

#[derive(Subcommand)]
enum RouteAction {
    /// Show cached routes.
    Show,

    /// Add a route to the main table.
    Add(RouteSpec),

    /// Delete a route from the main table.
    #[command(visible_alias = "delete")]
    Del(RouteSpec),
}

impl RouteCmd {
    pub async fn run(
        self,
        session: &Session,
        output: Output,
        family: Option<u8>,
    ) -> anyhow::Result<()> {
        match self.action.unwrap_or(RouteAction::Show) {
            RouteAction::Show => Self::show(session, output, family),
            RouteAction::Add(spec) => Ok(session.add_route(&spec.to_route()).await?),
            RouteAction::Del(spec) => Ok(session.del_route(&spec.to_route()).await?),
        }
    }

    fn show(session: &Session, output: Output, family: Option<u8>) -> anyhow::Result<()> {
        let mut routes = Vec::new();
        if family != Some(libc::AF_INET6 as u8) {
            routes.extend(session.ipv4_routes());
        }
        if family != Some(libc::AF_INET as u8) {
            routes.extend(session.ipv6_routes());
        }

        if output.json {
            return output.print_json(&routes);
        }
        for route in &routes {
            println!("{}", format_route(session, route));
        }
        Ok(())
    }
}

fn format_route(session: &Session, route: &RouteEntry) -> String {
    let mut line = if route.destination.prefix_len() == 0 {
        "default".to_string()
    } else {
        route.destination.to_string()
    };
    if let Some(gateway) = route.gateway {
        line.push_str(&format!(" via {}", gateway));
    }
    if route.oif != 0 {
        match session.interface(route.oif) {
            Some(link) => line.push_str(&format!(" dev {}", link.name)),
            None => line.push_str(&format!(" dev if{}", route.oif)),
        }
    }
    line.push_str(&format!(
        " proto {} scope {}",
        route.protocol().name(),
        route.scope().name()
    ));
    if let Some(source) = route.source {
        line.push_str(&format!(" src {}", source));
    }
    line
}
