//! rtctl monitor - print kernel events as the session sees them.

use clap::{Args, ValueEnum};
use rtlink::Session;
use rtlink::netlink::events::NetworkEvent;
use serde_json::json;
use tokio_stream::StreamExt;

use super::Output;

/// Event types that can be monitored.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum EventType {
    /// Interfaces created, changed or deleted.
    Link,
    /// Addresses added or removed.
    Address,
    /// Routing table changes.
    Route,
    /// All event types.
    All,
}

impl EventType {
    fn matches(self, event: &NetworkEvent) -> bool {
        match self {
            EventType::Link => event.as_link().is_some(),
            EventType::Address => event.as_address().is_some(),
            EventType::Route => event.as_route().is_some(),
            EventType::All => true,
        }
    }
}

#[derive(Args)]
pub struct MonitorCmd {
    /// Event types to monitor.
    #[arg(default_value = "all")]
    objects: Vec<EventType>,
}

impl MonitorCmd {
    pub async fn run(&self, session: &Session, output: Output) -> anyhow::Result<()> {
        let mut stream = session.subscribe();
        if !output.json {
            eprintln!("Monitoring rtnetlink events (Ctrl+C to stop)...");
        }

        loop {
            let event = tokio::select! {
                event = stream.next() => event,
                _ = tokio::signal::ctrl_c() => break,
            };
            let Some(event) = event else { break };
            if !self.objects.iter().any(|o| o.matches(&event)) {
                continue;
            }
            if output.json {
                output.print_json(&to_json(&event))?;
            } else {
                println!("{}", to_text(&event));
            }
        }
        Ok(())
    }
}

fn to_text(event: &NetworkEvent) -> String {
    let action = event.action();
    match event {
        NetworkEvent::NewLink(link) | NetworkEvent::DelLink(link) => format!(
            "[{}] link {}: {} mtu {}",
            action,
            link.ifindex(),
            link.name.as_deref().unwrap_or("?"),
            link.mtu.unwrap_or(0)
        ),
        NetworkEvent::NewAddress(addr) | NetworkEvent::DelAddress(addr) => format!(
            "[{}] addr if{}: {}/{}",
            action,
            addr.ifindex(),
            addr.primary_address()
                .map_or_else(|| "?".to_string(), |a| a.to_string()),
            addr.prefix_len()
        ),
        NetworkEvent::NewRoute(route) | NetworkEvent::DelRoute(route) => {
            let destination = route
                .destination
                .map_or_else(|| "default".to_string(), |d| format!("{}/{}", d, route.dst_len()));
            let mut line = format!("[{}] route {}", action, destination);
            if let Some(gateway) = route.gateway {
                line.push_str(&format!(" via {}", gateway));
            }
            if let Some(oif) = route.oif {
                line.push_str(&format!(" oif {}", oif));
            }
            line
        }
    }
}

fn to_json(event: &NetworkEvent) -> serde_json::Value {
    let action = event.action();
    match event {
        NetworkEvent::NewLink(link) | NetworkEvent::DelLink(link) => json!({
            "event": "link",
            "action": action,
            "index": link.ifindex(),
            "name": link.name,
            "mtu": link.mtu,
        }),
        NetworkEvent::NewAddress(addr) | NetworkEvent::DelAddress(addr) => json!({
            "event": "address",
            "action": action,
            "index": addr.ifindex(),
            "address": addr.primary_address(),
            "prefixlen": addr.prefix_len(),
            "label": addr.label,
        }),
        NetworkEvent::NewRoute(route) | NetworkEvent::DelRoute(route) => json!({
            "event": "route",
            "action": action,
            "family": route.family(),
            "dst": route.destination,
            "dst_len": route.dst_len(),
            "gateway": route.gateway,
            "oif": route.oif,
            "table": route.table_id(),
        }),
    }
}
