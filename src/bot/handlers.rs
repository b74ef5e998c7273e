//! Conversation handlers: one command in, zero or more replies out.

use anyhow::Result;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::commands::Command;
use crate::db::{Database, Location, OwnerId, StoreError, Subscription, SubscriptionFields};
use crate::format;
use crate::lookup::{GeocodeMatch, SweepLookup};
use crate::projector::SweepProjector;

const LOOKING_UP: &str = "🔍 Looking up your address...";
const ADDRESS_NOT_FOUND: &str =
    "❌ Couldn't find that address. Try including the full street name and zip code.";
const SERVICE_DOWN: &str = format::SERVICE_DOWN_TEXT;
const SWEEP_USAGE: &str = "Please provide an address.\nExample: `/sweep 1234 Main St, Los Angeles`";
const SUBSCRIBE_USAGE: &str =
    "Please provide an address.\nExample: `/subscribe 1234 Main St, Los Angeles`";
const TEXT_HINT: &str =
    "Send me a street address to look up sweeping.\nExample: `1234 Main St, Los Angeles`";
const NO_ROUTES_TO_SUBSCRIBE: &str =
    "No posted sweep routes found at that address. Can't subscribe.";
const NO_SUBSCRIPTIONS: &str =
    "You don't have any subscriptions yet.\nUse `/subscribe <address>` to get sweep alerts.";
const INVALID_NUMBER: &str = "Invalid number. Use `/mysubs` to see your subscriptions.";
const ALREADY_REMOVED: &str =
    "That subscription was already removed. Use `/mysubs` to see your subscriptions.";
const UNSUBSCRIBE_USAGE: &str = "Usage:\n\
• `/unsubscribe 1` — remove subscription #1\n\
• `/unsubscribe all` — remove all\n\n\
Use `/mysubs` to see your subscriptions.";
pub const INTERNAL_ERROR: &str = format::INTERNAL_ERROR_TEXT;

/// One outgoing chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub markdown: bool,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: false,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: true,
        }
    }
}

pub struct BotHandler {
    db: Arc<Database>,
    projector: Arc<SweepProjector>,
    lookup: Arc<SweepLookup>,
}

impl BotHandler {
    pub fn new(db: Arc<Database>, projector: Arc<SweepProjector>, lookup: Arc<SweepLookup>) -> Self {
        Self {
            db,
            projector,
            lookup,
        }
    }

    /// Handle a command from `chat`. Replies are emitted as they are ready
    /// so progress messages go out before slow lookups. Errors are store
    /// failures; lookup failures are answered in-chat.
    pub fn handle(
        &self,
        chat: OwnerId,
        command: Command,
        today: NaiveDate,
        reply: &mut dyn FnMut(Reply),
    ) -> Result<()> {
        match command {
            Command::Help => reply(Reply::markdown(format::HELP_TEXT)),
            Command::Sweep(address) if address.is_empty() => reply(Reply::markdown(SWEEP_USAGE)),
            Command::Sweep(address) => self.lookup_address(&address, today, reply),
            Command::Text(text) => {
                // Anything with a number might be an address
                if text.chars().any(|c| c.is_ascii_digit()) {
                    self.lookup_address(&text, today, reply);
                } else {
                    reply(Reply::markdown(TEXT_HINT));
                }
            }
            Command::Location {
                latitude,
                longitude,
            } => {
                let label = format!("{:.5}, {:.5}", latitude, longitude);
                self.lookup_coords(longitude, latitude, &label, today, reply);
            }
            Command::Subscribe(address) if address.is_empty() => {
                reply(Reply::markdown(SUBSCRIBE_USAGE))
            }
            Command::Subscribe(address) => self.subscribe(chat, &address, reply)?,
            Command::MySubs => self.list(chat, today, reply)?,
            Command::Unsubscribe(arg) => self.unsubscribe(chat, &arg, reply)?,
        }
        Ok(())
    }

    /// Geocode and report; `None` means a reply has already been sent.
    fn geocode(&self, address: &str, reply: &mut dyn FnMut(Reply)) -> Option<GeocodeMatch> {
        reply(Reply::plain(LOOKING_UP));
        match self.lookup.geocode(address) {
            Ok(Some(m)) => Some(m),
            Ok(None) => {
                reply(Reply::plain(ADDRESS_NOT_FOUND));
                None
            }
            Err(e) => {
                warn!(address = %address, "Geocode failed: {:#}", e);
                reply(Reply::plain(SERVICE_DOWN));
                None
            }
        }
    }

    fn lookup_address(&self, address: &str, today: NaiveDate, reply: &mut dyn FnMut(Reply)) {
        if let Some(m) = self.geocode(address, reply) {
            self.lookup_coords(m.x, m.y, &m.label, today, reply);
        }
    }

    fn lookup_coords(&self, x: f64, y: f64, label: &str, today: NaiveDate, reply: &mut dyn FnMut(Reply)) {
        match self.lookup.sweep_details(x, y) {
            Ok(details) => reply(Reply::markdown(format::lookup_reply(
                label,
                details.as_ref(),
                &self.projector,
                today,
            ))),
            Err(e) => {
                warn!(x, y, "Route lookup failed: {:#}", e);
                reply(Reply::plain(SERVICE_DOWN));
            }
        }
    }

    fn subscribe(&self, chat: OwnerId, address: &str, reply: &mut dyn FnMut(Reply)) -> Result<()> {
        let Some(m) = self.geocode(address, reply) else {
            return Ok(());
        };
        let details = match self.lookup.sweep_details(m.x, m.y) {
            Ok(Some(details)) => details,
            Ok(None) => {
                reply(Reply::plain(NO_ROUTES_TO_SUBSCRIBE));
                return Ok(());
            }
            Err(e) => {
                warn!(x = m.x, y = m.y, "Route lookup failed: {:#}", e);
                reply(Reply::plain(SERVICE_DOWN));
                return Ok(());
            }
        };

        let fields = SubscriptionFields {
            label: m.label.clone(),
            sweep_days: details.sweep_days.clone(),
            sweep_schedule: details.sweep_schedule.clone(),
            sweep_time: details.sweep_time.clone(),
            street_name: Some(details.street_name.clone()).filter(|s| !s.trim().is_empty()),
        };
        match self.db.add_subscription(chat, Location::new(m.x, m.y), &fields) {
            Ok(()) => {
                info!(owner = chat, street = %details.street_name, "Subscribed");
                reply(Reply::plain(format::subscribed(&m.label, &details)));
            }
            Err(e @ StoreError::CapExceeded { .. }) => reply(Reply::plain(e.to_string())),
            Err(e) => {
                error!(owner = chat, "Failed to save subscription: {}", e);
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn list(&self, chat: OwnerId, today: NaiveDate, reply: &mut dyn FnMut(Reply)) -> Result<()> {
        let subs = self.db.get_owner_subscriptions(chat)?;
        if subs.is_empty() {
            reply(Reply::markdown(NO_SUBSCRIPTIONS));
        } else {
            reply(Reply::plain(format::subscription_list(&subs, &self.projector, today)));
        }
        Ok(())
    }

    fn unsubscribe(&self, chat: OwnerId, arg: &str, reply: &mut dyn FnMut(Reply)) -> Result<()> {
        let arg = arg.trim().to_lowercase();

        if arg == "all" {
            let removed = self.db.remove_all_subscriptions(chat)?;
            if removed > 0 {
                info!(owner = chat, removed, "Unsubscribed from all");
                reply(Reply::plain(format!("✅ Removed all {} subscription(s).", removed)));
            } else {
                reply(Reply::plain("You don't have any subscriptions."));
            }
            return Ok(());
        }

        if !arg.is_empty() && arg.chars().all(|c| c.is_ascii_digit()) {
            let subs = self.db.get_owner_subscriptions(chat)?;
            let position = arg.parse::<usize>().unwrap_or(0);
            let Some(sub) = position.checked_sub(1).and_then(|i| subs.get(i)) else {
                reply(Reply::markdown(INVALID_NUMBER));
                return Ok(());
            };
            return self.remove_listed(chat, sub, reply);
        }

        reply(Reply::markdown(UNSUBSCRIBE_USAGE));
        Ok(())
    }

    /// Remove a subscription the owner picked from their list. It may have
    /// gone in the meantime (another chat session, or a purge).
    fn remove_listed(&self, chat: OwnerId, sub: &Subscription, reply: &mut dyn FnMut(Reply)) -> Result<()> {
        if self.db.remove_subscription(chat, sub.id)? == 1 {
            info!(owner = chat, subscription = sub.id, "Unsubscribed");
            reply(Reply::plain(format!(
                "✅ Unsubscribed from sweep alerts for {}.",
                sub.label
            )));
        } else {
            reply(Reply::markdown(ALREADY_REMOVED));
        }
        Ok(())
    }
}
