//! # Event Router
//!
//! Holds the event bindings made at startup and fans each gateway event out
//! to every listener bound to its name.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use serenity::model::event::Event;
use serenity::prelude::Context;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Event names a binding may subscribe to
pub const KNOWN_EVENTS: &[&str] = &[
    "ready",
    "resumed",
    "guild_create",
    "guild_delete",
    "interaction_create",
    "message_create",
    "voice_state_update",
    "voice_server_update",
];

/// Map a decoded gateway event to its binding name
pub fn event_name(event: &Event) -> &'static str {
    match event {
        Event::Ready(_) => "ready",
        Event::Resumed(_) => "resumed",
        Event::GuildCreate(_) => "guild_create",
        Event::GuildDelete(_) => "guild_delete",
        Event::InteractionCreate(_) => "interaction_create",
        Event::MessageCreate(_) => "message_create",
        Event::VoiceStateUpdate(_) => "voice_state_update",
        Event::VoiceServerUpdate(_) => "voice_server_update",
        _ => "unknown",
    }
}

#[async_trait]
pub trait EventListener: Send + Sync {
    async fn on_event(&self, ctx: &Context, event: &Event) -> Result<()>;
}

/// One subscription made during startup
pub struct EventBinding {
    pub event: &'static str,
    /// Fire at most once for the process lifetime
    pub once: bool,
    pub listener: Arc<dyn EventListener>,
}

impl EventBinding {
    pub fn on(event: &'static str, listener: Arc<dyn EventListener>) -> Self {
        Self {
            event,
            once: false,
            listener,
        }
    }

    pub fn once(event: &'static str, listener: Arc<dyn EventListener>) -> Self {
        Self {
            event,
            once: true,
            listener,
        }
    }
}

struct BoundListener {
    once: bool,
    fired: AtomicBool,
    listener: Arc<dyn EventListener>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindReport {
    pub bound: usize,
    pub rejected: Vec<&'static str>,
}

#[derive(Default)]
pub struct EventRouter {
    bindings: RwLock<HashMap<&'static str, Vec<Arc<BoundListener>>>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every entry; unknown event names are rejected with a warning
    pub fn bind_all(&self, bindings: impl IntoIterator<Item = EventBinding>) -> BindReport {
        let mut report = BindReport::default();
        let Ok(mut table) = self.bindings.write() else {
            error!("Event binding table lock poisoned");
            return report;
        };

        for binding in bindings {
            if !KNOWN_EVENTS.contains(&binding.event) {
                warn!("⚠️ Skipping binding for unknown event '{}'", binding.event);
                report.rejected.push(binding.event);
                continue;
            }

            debug!(
                "Bound {} listener for '{}'",
                if binding.once { "one-shot" } else { "persistent" },
                binding.event
            );
            table.entry(binding.event).or_default().push(Arc::new(BoundListener {
                once: binding.once,
                fired: AtomicBool::new(false),
                listener: binding.listener,
            }));
            report.bound += 1;
        }

        info!(
            "📡 Bound {} event listeners ({} rejected)",
            report.bound,
            report.rejected.len()
        );
        report
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.bindings
            .read()
            .map(|t| t.get(event).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Listeners that should receive the next `event`, consuming one-shots
    pub fn take_listeners(&self, event: &str) -> Vec<Arc<dyn EventListener>> {
        let Ok(table) = self.bindings.read() else {
            return Vec::new();
        };
        table
            .get(event)
            .map(|bound| {
                bound
                    .iter()
                    .filter(|b| !b.once || !b.fired.swap(true, Ordering::AcqRel))
                    .map(|b| b.listener.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn dispatch(&self, ctx: &Context, event: &Event) {
        let name = event_name(event);
        for listener in self.take_listeners(name) {
            if let Err(e) = listener.on_event(ctx, event).await {
                error!("Error handling '{name}' event: {e:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl EventListener for Noop {
        async fn on_event(&self, _ctx: &Context, _event: &Event) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_one_shot_fires_once() {
        let router = EventRouter::new();
        router.bind_all(vec![
            EventBinding::once("ready", Arc::new(Noop)),
            EventBinding::on("message_create", Arc::new(Noop)),
        ]);

        assert_eq!(router.take_listeners("ready").len(), 1);
        assert!(router.take_listeners("ready").is_empty());
        assert_eq!(router.take_listeners("message_create").len(), 1);
        assert_eq!(router.take_listeners("message_create").len(), 1);
    }

    #[test]
    fn test_unknown_events_rejected() {
        let router = EventRouter::new();
        let report = router.bind_all(vec![
            EventBinding::on("clientReady", Arc::new(Noop)),
            EventBinding::on("interaction_create", Arc::new(Noop)),
        ]);

        assert_eq!(report.bound, 1);
        assert_eq!(report.rejected, vec!["clientReady"]);
        assert_eq!(router.listener_count("interaction_create"), 1);
        assert!(router.take_listeners("clientReady").is_empty());
    }

    #[test]
    fn test_multiple_listeners_per_event() {
        let router = EventRouter::new();
        router.bind_all(vec![
            EventBinding::on("guild_create", Arc::new(Noop)),
            EventBinding::on("guild_create", Arc::new(Noop)),
        ]);
        assert_eq!(router.take_listeners("guild_create").len(), 2);
    }

    #[test]
    fn test_unbound_event_has_no_listeners() {
        let router = EventRouter::new();
        assert_eq!(router.listener_count("ready"), 0);
        assert!(router.take_listeners("ready").is_empty());
    }
}
