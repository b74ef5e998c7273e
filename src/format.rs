//! Chat message text: lookup cards, subscription lists, and reminders.

use chrono::NaiveDate;

use crate::db::Subscription;
use crate::lookup::SweepDetails;
use crate::notify::Reminder;
use crate::projector::SweepProjector;

/// StreetsLA sweeping dashboard.
pub const MAP_URL: &str =
    "https://labss.maps.arcgis.com/apps/dashboards/ad01106434a443a69924c54f1e8edbf7";

/// Dates shown on a lookup card.
const CARD_DATES: usize = 4;
/// Dates projected per weekday for a lookup card.
const CARD_DATES_PER_DAY: usize = 3;

pub const HELP_TEXT: &str = "🧹 *LA Street Sweeping Bot*\n\n\
Send me an address and I'll tell you the street sweeping schedule.\n\n\
*Look up:*\n\
• `/sweep 1234 Main St, Los Angeles`\n\
• Just type an address\n\
• Or share your 📍 location!\n\n\
*Notifications:*\n\
• `/subscribe 1234 Main St` — get alerts before sweeping\n\
• `/mysubs` — see your subscriptions\n\
• `/unsubscribe` — remove alerts\n\n\
Data from City of LA StreetsLA via ArcGIS.";

pub const NOT_FOUND_TEXT: &str = "No posted sweep routes found nearby. \
This street may not have posted sweeping, or it might be outside the City of LA.";

pub const SERVICE_DOWN_TEXT: &str =
    "⚠️ The city's map service isn't answering right now. Please try again later.";

pub const INTERNAL_ERROR_TEXT: &str = "Something went wrong. Please try again later.";

/// Treat blank text the same as a missing value.
fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// "Mon Mar 9"
pub fn short_date(date: NaiveDate) -> String {
    date.format("%a %b %-d").to_string()
}

/// "Monday Mar 9"
pub fn long_date(date: NaiveDate) -> String {
    date.format("%A %b %-d").to_string()
}

/// Markdown card describing a street's schedule and its next sweep dates.
pub fn street_summary(details: &SweepDetails, projector: &SweepProjector, today: NaiveDate) -> String {
    let mut lines = vec![format!("🧹 *{}*", details.street_name)];
    if !details.sweep_days.is_empty() {
        lines.push(format!("📅 {}", details.sweep_days.join(" & ")));
    }
    if !details.sweep_schedule.is_blank() {
        lines.push(format!("🔄 {}", details.sweep_schedule));
    }
    if let Some(time) = present(details.sweep_time.as_deref()) {
        lines.push(format!("🕐 {}", time));
    }

    if !details.sweep_days.is_empty() && !details.sweep_schedule.is_blank() {
        let weeks = details.sweep_schedule.weeks();
        if projector.is_sweep_day_any(&details.sweep_days, weeks, today) {
            lines.push("\n⚠️ *SWEEPING TODAY — MOVE YOUR CAR!*".to_string());
        }
        let dates = projector.next_across(&details.sweep_days, weeks, today, CARD_DATES_PER_DAY);
        if !dates.is_empty() {
            let shown: Vec<String> = dates.iter().take(CARD_DATES).map(|d| short_date(*d)).collect();
            lines.push(format!("\n📆 Next: {}", shown.join(", ")));
        }
    }

    lines.join("\n")
}

/// Full reply for a location lookup.
pub fn lookup_reply(label: &str, details: Option<&SweepDetails>, projector: &SweepProjector, today: NaiveDate) -> String {
    match details {
        Some(details) => format!(
            "📍 *{}*\n{}\n\n[View on LA Map]({})",
            label,
            street_summary(details, projector, today),
            MAP_URL
        ),
        None => format!(
            "📍 *{}*\n\n{}\n\n[Check the map]({})",
            label, NOT_FOUND_TEXT, MAP_URL
        ),
    }
}

/// Confirmation after a successful subscribe.
pub fn subscribed(label: &str, details: &SweepDetails) -> String {
    format!(
        "✅ Subscribed to sweep alerts!\n\n\
         📍 {}\n\
         🧹 {}\n\
         📅 {} ({})\n\
         🕐 {}\n\n\
         You'll get notifications 2 days and 1 day before each sweep.\n\
         Use /mysubs to see your subscriptions.",
        label,
        details.street_name,
        details.sweep_days.join(" & "),
        details.sweep_schedule,
        present(details.sweep_time.as_deref()).unwrap_or("Check posted signs"),
    )
}

/// Numbered list of an owner's subscriptions with each one's next sweep.
pub fn subscription_list(subs: &[Subscription], projector: &SweepProjector, today: NaiveDate) -> String {
    let mut lines = vec!["📋 Your Subscriptions\n".to_string()];
    for (i, sub) in subs.iter().enumerate() {
        let next = projector
            .next_across(&sub.sweep_days, sub.sweep_schedule.weeks(), today, 1)
            .first()
            .map(|d| short_date(*d))
            .unwrap_or_else(|| "—".to_string());
        lines.push(format!(
            "{}. 📍 {}\n   🧹 {} — {} ({})\n   📆 Next: {}",
            i + 1,
            sub.label,
            present(sub.street_name.as_deref()).unwrap_or("—"),
            sub.sweep_days.join(" & "),
            sub.sweep_schedule,
            next
        ));
    }
    lines.push("\nTo unsubscribe: /unsubscribe <number> or /unsubscribe all".to_string());
    lines.join("\n")
}

/// Reminder text delivered by the daily notification run.
pub fn reminder(sub: &Subscription, reminder: Reminder) -> String {
    let street = present(sub.street_name.as_deref()).unwrap_or("Your street");
    let time = present(sub.sweep_time.as_deref()).unwrap_or("Check posted signs");
    match reminder {
        Reminder::Tomorrow(date) => format!(
            "⚠️ Sweep TOMORROW!\n📍 {}\n🧹 {}\n📅 {}\n🕐 {}\n\nMove your car tonight!",
            sub.label,
            street,
            long_date(date),
            time
        ),
        Reminder::InTwoDays(date) => format!(
            "📋 Sweep in 2 days\n📍 {}\n🧹 {}\n📅 {}\n🕐 {}",
            sub.label,
            street,
            long_date(date),
            time
        ),
    }
}
