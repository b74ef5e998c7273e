//! The Telegram chat front end.

pub mod commands;
pub mod handlers;
pub mod telegram;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub use commands::Command;
pub use handlers::{BotHandler, Reply};
pub use telegram::{TelegramClient, TelegramError, Update};

use crate::notify::DailySchedule;

/// Pause after a failed poll before trying again.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Answer one update. Reply delivery failures are logged, not retried.
pub fn dispatch_update(client: &TelegramClient, handler: &BotHandler, clock: &DailySchedule, update: Update) {
    let Some(message) = update.message else {
        return;
    };
    let Some(command) = Command::from_message(&message) else {
        debug!(update = update.update_id, "Ignoring message");
        return;
    };
    let chat = message.chat.id;

    let mut send = |reply: Reply| {
        if let Err(e) = client.send_message(chat, &reply.text, reply.markdown) {
            warn!(chat, "Failed to send reply: {}", e);
        }
    };
    if let Err(e) = handler.handle(chat, command, clock.today(), &mut send) {
        error!(chat, "Command failed: {:#}", e);
        send(Reply::plain(handlers::INTERNAL_ERROR));
    }
}

/// Where the poll loop gets its updates.
pub trait UpdateSource {
    fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError>;
    fn acknowledge(&self, offset: i64) -> Result<(), TelegramError>;
}

impl UpdateSource for TelegramClient {
    fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        TelegramClient::get_updates(self, offset)
    }

    fn acknowledge(&self, offset: i64) -> Result<(), TelegramError> {
        TelegramClient::acknowledge(self, offset)
    }
}

/// Long-poll Telegram and answer updates until `running` is cleared.
pub fn run_polling(
    client: &TelegramClient,
    handler: &BotHandler,
    clock: &DailySchedule,
    running: &AtomicBool,
) {
    info!("Bot polling started");
    poll_updates(client, running, |update| {
        dispatch_update(client, handler, clock, update)
    });
    info!("Bot polling stopped");
}

/// Feed updates to `handle` until `running` is cleared, then confirm the
/// last handled batch so a restart does not see it again. Returns the
/// final offset.
pub fn poll_updates(
    source: &dyn UpdateSource,
    running: &AtomicBool,
    mut handle: impl FnMut(Update),
) -> i64 {
    let mut offset = 0;
    while running.load(Ordering::SeqCst) {
        let updates = match source.get_updates(offset) {
            Ok(updates) => updates,
            Err(e) => {
                warn!("Polling failed: {}", e);
                thread::sleep(POLL_RETRY_DELAY);
                continue;
            }
        };
        for update in updates {
            offset = offset.max(update.update_id + 1);
            handle(update);
        }
    }

    if offset > 0 {
        match source.acknowledge(offset) {
            Ok(()) => debug!(offset, "Acknowledged handled updates"),
            Err(e) => warn!(offset, "Failed to acknowledge updates: {}", e),
        }
    }
    offset
}
