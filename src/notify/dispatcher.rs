//! The daily notification pass.
//!
//! For every subscription the run projects the next sweep dates, decides
//! whether a 1-day or 2-day warning is due, and delivers it. Owners who can
//! no longer be reached lose all of their subscriptions. Subscriptions are
//! processed one at a time, and one failed delivery never stops the run.

use chrono::{Duration, NaiveDate};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::transport::{DeliveryError, Transport};
use crate::db::{Database, OwnerId, StoreError};
use crate::format;
use crate::projector::SweepProjector;

/// Dates projected per sweep weekday when checking a subscription.
pub const UPCOMING_PER_DAY: usize = 2;

/// The warning due for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reminder {
    Tomorrow(NaiveDate),
    InTwoDays(NaiveDate),
}

/// Pick the warning for a sorted list of upcoming dates. A sweep tomorrow
/// always wins over one in two days.
pub fn classify(upcoming: &[NaiveDate], today: NaiveDate) -> Option<Reminder> {
    let tomorrow = today + Duration::days(1);
    let day_after = today + Duration::days(2);

    let mut reminder = None;
    for &date in upcoming {
        if date == tomorrow {
            return Some(Reminder::Tomorrow(date));
        }
        if date == day_after {
            reminder = Some(Reminder::InTwoDays(date));
        }
    }
    reminder
}

/// Counters for one notification run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub subscriptions: usize,
    pub checked: usize,
    pub sent_tomorrow: usize,
    pub sent_in_two_days: usize,
    pub transient_failures: usize,
    pub purged_owners: usize,
    pub purged_subscriptions: usize,
}

impl RunSummary {
    pub fn sent(&self) -> usize {
        self.sent_tomorrow + self.sent_in_two_days
    }
}

pub struct NotificationDispatcher {
    db: Arc<Database>,
    projector: Arc<SweepProjector>,
    transport: Arc<dyn Transport>,
}

impl NotificationDispatcher {
    pub fn new(
        db: Arc<Database>,
        projector: Arc<SweepProjector>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            db,
            projector,
            transport,
        }
    }

    /// Run the pass for `today` (the jurisdiction's local date).
    ///
    /// Only failing to read the subscription list is an error; delivery and
    /// purge failures are logged and counted.
    pub fn run(&self, today: NaiveDate) -> Result<RunSummary, StoreError> {
        let subs = self.db.get_all_subscriptions()?;
        info!(
            count = subs.len(),
            %today,
            channel = self.transport.channel_name(),
            "Notification check"
        );

        let mut summary = RunSummary {
            subscriptions: subs.len(),
            ..Default::default()
        };
        let mut blocked: HashSet<OwnerId> = HashSet::new();

        for sub in &subs {
            if blocked.contains(&sub.owner_id) {
                continue;
            }
            summary.checked += 1;

            let upcoming = self.projector.next_across(
                &sub.sweep_days,
                sub.sweep_schedule.weeks(),
                today,
                UPCOMING_PER_DAY,
            );
            let Some(reminder) = classify(&upcoming, today) else {
                continue;
            };

            let text = format::reminder(sub, reminder);
            match self.transport.deliver(sub.owner_id, &text) {
                Ok(()) => {
                    debug!(owner = sub.owner_id, subscription = sub.id, ?reminder, "Reminder sent");
                    match reminder {
                        Reminder::Tomorrow(_) => summary.sent_tomorrow += 1,
                        Reminder::InTwoDays(_) => summary.sent_in_two_days += 1,
                    }
                }
                Err(DeliveryError::Permanent(reason)) => {
                    info!(
                        owner = sub.owner_id,
                        %reason,
                        "Owner unreachable, removing subscriptions"
                    );
                    blocked.insert(sub.owner_id);
                    summary.purged_owners += 1;
                    match self.db.remove_all_subscriptions(sub.owner_id) {
                        Ok(removed) => summary.purged_subscriptions += removed,
                        Err(e) => error!(
                            owner = sub.owner_id,
                            "Failed to remove subscriptions: {}", e
                        ),
                    }
                }
                Err(DeliveryError::Transient(reason)) => {
                    warn!(
                        owner = sub.owner_id,
                        subscription = sub.id,
                        %reason,
                        "Failed to send notification"
                    );
                    summary.transient_failures += 1;
                }
            }
        }

        info!(
            checked = summary.checked,
            sent = summary.sent(),
            purged_owners = summary.purged_owners,
            transient_failures = summary.transient_failures,
            "Notification run complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::SweepCalendar;
    use crate::db::{Location, SubscriptionFields};
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Records deliveries; fails for configured owners.
    #[derive(Default)]
    struct FakeTransport {
        sent: Mutex<Vec<(OwnerId, String)>>,
        attempts: Mutex<Vec<OwnerId>>,
        failures: HashMap<OwnerId, DeliveryError>,
    }

    impl FakeTransport {
        fn failing(failures: &[(OwnerId, DeliveryError)]) -> Self {
            Self {
                failures: failures.iter().cloned().collect(),
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<(OwnerId, String)> {
            self.sent.lock().unwrap().clone()
        }

        fn attempts_for(&self, owner: OwnerId) -> usize {
            self.attempts.lock().unwrap().iter().filter(|o| **o == owner).count()
        }
    }

    impl Transport for FakeTransport {
        fn deliver(&self, owner: OwnerId, text: &str) -> Result<(), DeliveryError> {
            self.attempts.lock().unwrap().push(owner);
            if let Some(err) = self.failures.get(&owner) {
                return Err(err.clone());
            }
            self.sent.lock().unwrap().push((owner, text.to_string()));
            Ok(())
        }

        fn channel_name(&self) -> &str {
            "fake"
        }
    }

    fn setup(transport: Arc<FakeTransport>) -> (Arc<Database>, NotificationDispatcher) {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let db = Arc::new(db);
        let projector = Arc::new(SweepProjector::new(Arc::new(SweepCalendar::builtin().unwrap())));
        let dispatcher = NotificationDispatcher::new(Arc::clone(&db), projector, transport);
        (db, dispatcher)
    }

    fn subscribe(db: &Database, owner: OwnerId, i: u32, days: &[&str], schedule: &str) {
        let fields = SubscriptionFields {
            label: format!("{} Main St", 100 + i),
            sweep_days: days.iter().map(|d| d.to_string()).collect(),
            sweep_schedule: schedule.into(),
            sweep_time: Some("8am-10am".to_string()),
            street_name: Some("MAIN ST".to_string()),
        };
        db.add_subscription(owner, Location::new(-118.25 + i as f64 * 0.01, 34.05), &fields)
            .unwrap();
    }

    #[test]
    fn test_classify_tomorrow() {
        let today = date(2026, 3, 8);
        assert_eq!(
            classify(&[date(2026, 3, 9), date(2026, 3, 23)], today),
            Some(Reminder::Tomorrow(date(2026, 3, 9)))
        );
    }

    #[test]
    fn test_classify_day_after() {
        let today = date(2026, 3, 7);
        assert_eq!(
            classify(&[date(2026, 3, 9)], today),
            Some(Reminder::InTwoDays(date(2026, 3, 9)))
        );
    }

    #[test]
    fn test_classify_tomorrow_beats_day_after_in_any_order() {
        let today = date(2026, 3, 8);
        let expected = Some(Reminder::Tomorrow(date(2026, 3, 9)));
        assert_eq!(classify(&[date(2026, 3, 9), date(2026, 3, 10)], today), expected);
        assert_eq!(classify(&[date(2026, 3, 10), date(2026, 3, 9)], today), expected);
    }

    #[test]
    fn test_classify_nothing_due() {
        let today = date(2026, 3, 1);
        assert_eq!(classify(&[date(2026, 3, 9)], today), None);
        assert_eq!(classify(&[], today), None);
        // A sweep today is not a warning
        assert_eq!(classify(&[date(2026, 3, 1)], today), None);
    }

    #[test]
    fn test_run_sends_tomorrow_only_when_both_due() {
        let transport = Arc::new(FakeTransport::default());
        let (db, dispatcher) = setup(Arc::clone(&transport));
        // Monday Mar 9 and Tuesday Mar 10 are both "2 & 4" sweep days
        subscribe(&db, 1, 0, &["Tuesday", "Monday"], "2 & 4");

        let summary = dispatcher.run(date(2026, 3, 8)).unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("Sweep TOMORROW"));
        assert!(sent[0].1.contains("Monday Mar 9"));
        assert_eq!(summary.sent_tomorrow, 1);
        assert_eq!(summary.sent_in_two_days, 0);
    }

    #[test]
    fn test_run_sends_two_day_warning() {
        let transport = Arc::new(FakeTransport::default());
        let (db, dispatcher) = setup(Arc::clone(&transport));
        subscribe(&db, 1, 0, &["Monday"], "2 & 4");

        let summary = dispatcher.run(date(2026, 3, 7)).unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("Sweep in 2 days"));
        assert_eq!(summary.sent_in_two_days, 1);
    }

    #[test]
    fn test_run_skips_holiday_and_unmatched() {
        let transport = Arc::new(FakeTransport::default());
        let (db, dispatcher) = setup(Arc::clone(&transport));
        // Jan 19 is MLK Day; the "1 & 3" Monday sweep is cancelled
        subscribe(&db, 1, 0, &["Monday"], "1 & 3");
        // Wrong weeks for Jan 19
        subscribe(&db, 2, 0, &["Monday"], "2 & 4");

        let summary = dispatcher.run(date(2026, 1, 18)).unwrap();

        assert!(transport.sent().is_empty());
        assert_eq!(summary.checked, 2);
        assert_eq!(summary.sent(), 0);
    }

    #[test]
    fn test_run_skips_unposted_partial_week() {
        let transport = Arc::new(FakeTransport::default());
        let (db, dispatcher) = setup(Arc::clone(&transport));
        // June 29 - July 3 sits between June's week 4 and July's week 1.
        // Counting by day of month would make July 1 a week-1 Wednesday.
        subscribe(&db, 1, 0, &["Wednesday"], "1 & 3");
        subscribe(&db, 2, 0, &["Thursday"], "every week");

        for today in [date(2026, 6, 29), date(2026, 6, 30), date(2026, 7, 1)] {
            let summary = dispatcher.run(today).unwrap();
            assert_eq!(summary.checked, 2);
            assert_eq!(summary.sent(), 0, "unexpected reminder on {}", today);
        }
        assert!(transport.sent().is_empty());

        // The first posted Wednesday of July is the 8th
        dispatcher.run(date(2026, 7, 6)).unwrap();
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 1);
        assert!(sent[0].1.contains("Wednesday Jul 8"));
    }

    #[test]
    fn test_run_follows_week_spilling_into_next_year() {
        let transport = Arc::new(FakeTransport::default());
        let (db, dispatcher) = setup(Arc::clone(&transport));
        // December's week 4 runs Mon Dec 28 - Fri Jan 1
        subscribe(&db, 1, 0, &["Thursday"], "2 & 4");
        subscribe(&db, 2, 0, &["Friday"], "1 & 3");
        subscribe(&db, 3, 0, &["Friday"], "2nd & 4th");

        let summary = dispatcher.run(date(2026, 12, 30)).unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, 1);
        assert!(sent[0].1.contains("Sweep TOMORROW"));
        assert!(sent[0].1.contains("Thursday Dec 31"));
        assert_eq!(sent[1].0, 3);
        assert!(sent[1].1.contains("Sweep in 2 days"));
        assert!(sent[1].1.contains("Friday Jan 1"));
        assert_eq!(summary.sent_tomorrow, 1);
        assert_eq!(summary.sent_in_two_days, 1);
    }

    #[test]
    fn test_permanent_failure_purges_owner() {
        let transport = Arc::new(FakeTransport::failing(&[(
            1,
            DeliveryError::Permanent("Forbidden: bot was blocked by the user".into()),
        )]));
        let (db, dispatcher) = setup(Arc::clone(&transport));
        subscribe(&db, 1, 0, &["Monday"], "2 & 4");
        subscribe(&db, 1, 1, &["Monday"], "2 & 4");
        subscribe(&db, 1, 2, &["Monday"], "2 & 4");
        subscribe(&db, 2, 0, &["Monday"], "2 & 4");

        let summary = dispatcher.run(date(2026, 3, 8)).unwrap();

        assert_eq!(transport.attempts_for(1), 1);
        assert!(db.get_owner_subscriptions(1).unwrap().is_empty());
        assert_eq!(db.get_owner_subscriptions(2).unwrap().len(), 1);
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(summary.purged_owners, 1);
        assert_eq!(summary.purged_subscriptions, 3);
        assert_eq!(summary.checked, 2);
    }

    #[test]
    fn test_transient_failure_keeps_subscriptions() {
        let transport = Arc::new(FakeTransport::failing(&[(
            1,
            DeliveryError::Transient("timed out".into()),
        )]));
        let (db, dispatcher) = setup(Arc::clone(&transport));
        subscribe(&db, 1, 0, &["Monday"], "2 & 4");
        subscribe(&db, 1, 1, &["Monday"], "2 & 4");
        subscribe(&db, 2, 0, &["Monday"], "2 & 4");

        let summary = dispatcher.run(date(2026, 3, 8)).unwrap();

        // Both of owner 1's subscriptions are attempted, no retries
        assert_eq!(transport.attempts_for(1), 2);
        assert_eq!(db.get_owner_subscriptions(1).unwrap().len(), 2);
        assert_eq!(summary.transient_failures, 2);
        assert_eq!(summary.sent_tomorrow, 1);
        assert_eq!(summary.purged_owners, 0);
    }
}
