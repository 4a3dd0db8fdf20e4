//! Alert worker - sends fall alerts off the classification path
//!
//! The fall monitor enqueues an `AlertCmd` per fall event. The worker looks
//! up the current contacts and a best-effort location, composes the
//! emergency message and sends it to every contact independently. Outcomes
//! surface as user notices; nothing here is fatal and nothing is retried.

use crate::domain::alert::{compose_alert_message, split_sms};
use crate::domain::contact::PhoneNumber;
use crate::domain::types::{FallEvent, GeoLocation};
use crate::infra::metrics::Metrics;
use crate::io::location::LastKnownLocation;
use crate::io::notices::{NoticeSender, UserNotice, ALERT_VIBRATION_MS};
use crate::io::sms::{SmsError, SmsTransport};
use crate::services::contacts::ContactBook;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// A fall alert waiting to be sent
#[derive(Debug)]
pub struct AlertCmd {
    pub event: FallEvent,
    /// When the command was enqueued (for queue delay measurement)
    pub enqueued_at: Instant,
}

/// How a dispatch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing sent; the user has no emergency contacts
    NoContacts,
    /// Nothing sent; SMS permission missing
    PermissionDenied,
    /// One send attempted per contact
    Attempted { sent: usize, failed: usize },
}

pub struct AlertDispatcher {
    contacts: Arc<ContactBook>,
    location: Arc<LastKnownLocation>,
    transport: Arc<dyn SmsTransport>,
    notices: NoticeSender,
    metrics: Arc<Metrics>,
}

impl AlertDispatcher {
    pub fn new(
        contacts: Arc<ContactBook>,
        location: Arc<LastKnownLocation>,
        transport: Arc<dyn SmsTransport>,
        notices: NoticeSender,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { contacts, location, transport, notices, metrics }
    }

    /// Alert the current contacts about `event`
    pub async fn dispatch(&self, event: &FallEvent) -> DispatchOutcome {
        let contacts = self.contacts.list();
        let location = if contacts.is_empty() { None } else { self.location.query() };
        self.send_to_contacts(event, &contacts, location).await
    }

    /// Send the emergency message for `event` to each of `contacts`
    ///
    /// Every contact gets its own send; a failure for one never affects the
    /// others. Without contacts or SMS permission nothing is sent.
    pub async fn send_to_contacts(
        &self,
        event: &FallEvent,
        contacts: &[PhoneNumber],
        location: Option<GeoLocation>,
    ) -> DispatchOutcome {
        if contacts.is_empty() {
            warn!(event_id = %event.id, "alert_no_contacts");
            self.metrics.record_alert_suppressed();
            self.notices.notify(UserNotice::NoContacts);
            return DispatchOutcome::NoContacts;
        }
        if !self.transport.permission_granted() {
            warn!(event_id = %event.id, "alert_sms_permission_denied");
            self.metrics.record_alert_suppressed();
            self.notices.notify(UserNotice::SmsPermissionDenied);
            return DispatchOutcome::PermissionDenied;
        }

        let message = compose_alert_message(location.as_ref());
        let parts: Arc<[String]> = split_sms(&message).into_vec().into();
        info!(
            event_id = %event.id,
            contacts = %contacts.len(),
            parts = %parts.len(),
            location_known = %location.is_some(),
            "alert_dispatching"
        );

        let mut sends = JoinSet::new();
        for contact in contacts {
            let transport = self.transport.clone();
            let parts = parts.clone();
            let contact = contact.clone();
            sends.spawn(async move {
                let result = transport.send(&contact, &parts).await;
                (contact, result)
            });
        }

        let (mut sent, mut failed) = (0usize, 0usize);
        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok((contact, Ok(()))) => {
                    sent += 1;
                    self.metrics.record_sms_result(true);
                    info!(event_id = %event.id, contact = %contact, "sms_sent");
                    self.notices.notify(UserNotice::SmsSent { contact });
                }
                Ok((contact, Err(e))) => {
                    failed += 1;
                    self.metrics.record_sms_result(false);
                    warn!(event_id = %event.id, contact = %contact, error = %e, "sms_failed");
                    if e == SmsError::PermissionDenied {
                        self.notices.notify(UserNotice::SmsPermissionDenied);
                    } else {
                        self.notices.notify(UserNotice::SmsFailed {
                            contact,
                            reason: e.to_string(),
                        });
                    }
                }
                Err(e) => {
                    failed += 1;
                    self.metrics.record_sms_result(false);
                    error!(event_id = %event.id, error = %e, "sms_task_failed");
                }
            }
        }

        self.metrics.record_alert_dispatched();
        self.notices.notify(UserNotice::AlertVibration { duration_ms: ALERT_VIBRATION_MS });
        info!(event_id = %event.id, sent = %sent, failed = %failed, "alert_dispatched");

        DispatchOutcome::Attempted { sent, failed }
    }
}

/// Worker that processes alert commands asynchronously
pub struct AlertWorker {
    dispatcher: Arc<AlertDispatcher>,
    cmd_rx: mpsc::Receiver<AlertCmd>,
    metrics: Arc<Metrics>,
}

impl AlertWorker {
    pub fn new(
        dispatcher: Arc<AlertDispatcher>,
        cmd_rx: mpsc::Receiver<AlertCmd>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { dispatcher, cmd_rx, metrics }
    }

    /// Run the worker, processing commands until the channel closes
    pub async fn run(mut self) {
        info!("alert_worker_started");

        while let Some(cmd) = self.cmd_rx.recv().await {
            let queue_delay_us = cmd.enqueued_at.elapsed().as_micros() as u64;
            self.metrics.record_alert_queue_delay(queue_delay_us);

            let send_start = Instant::now();
            let outcome = self.dispatcher.dispatch(&cmd.event).await;

            info!(
                event_id = %cmd.event.id,
                outcome = ?outcome,
                queue_delay_us = %queue_delay_us,
                total_send_ms = %send_start.elapsed().as_millis(),
                "alert_cmd_processed"
            );
        }

        info!("alert_worker_stopped");
    }
}

/// Create an alert command channel and worker
///
/// Returns the sender (for the fall monitor) and the worker (to be spawned)
pub fn create_alert_worker(
    dispatcher: Arc<AlertDispatcher>,
    metrics: Arc<Metrics>,
    buffer_size: usize,
) -> (mpsc::Sender<AlertCmd>, AlertWorker) {
    let (cmd_tx, cmd_rx) = mpsc::channel(buffer_size);
    let worker = AlertWorker::new(dispatcher, cmd_rx, metrics);
    (cmd_tx, worker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contact::DialingPlan;
    use crate::domain::types::{ArmTrigger, LocationSource};
    use crate::io::location::StaticProvider;
    use crate::io::notices::create_notice_channel;
    use crate::io::preferences::MemoryPreferences;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Records sends; fails for numbers listed in `failing`
    struct MockTransport {
        permission: bool,
        failing: Vec<String>,
        sent: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl MockTransport {
        fn new(permission: bool, failing: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                permission,
                failing: failing.iter().map(|s| s.to_string()).collect(),
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SmsTransport for MockTransport {
        fn permission_granted(&self) -> bool {
            self.permission
        }

        async fn send(&self, to: &PhoneNumber, parts: &[String]) -> Result<(), SmsError> {
            if self.failing.iter().any(|f| f == to.as_str()) {
                return Err(SmsError::Transport("radio off".to_string()));
            }
            self.sent.lock().push((to.to_string(), parts.to_vec()));
            Ok(())
        }
    }

    fn numbers(raw: &[&str]) -> Vec<PhoneNumber> {
        raw.iter().map(|r| PhoneNumber::parse(r, &DialingPlan::default()).unwrap()).collect()
    }

    fn event() -> FallEvent {
        FallEvent::new(1_000, ArmTrigger::Impact { magnitude: 25.0 }, 0.3)
    }

    fn dispatcher(
        transport: Arc<MockTransport>,
        location: LastKnownLocation,
    ) -> (AlertDispatcher, mpsc::Receiver<UserNotice>, Arc<ContactBook>) {
        let prefs = Arc::new(MemoryPreferences::new());
        let book = Arc::new(ContactBook::load(prefs, DialingPlan::default()).unwrap());
        let (notices, notice_rx) = create_notice_channel(32);
        let dispatcher = AlertDispatcher::new(
            book.clone(),
            Arc::new(location),
            transport,
            notices,
            Arc::new(Metrics::new()),
        );
        (dispatcher, notice_rx, book)
    }

    fn drain(rx: &mut mpsc::Receiver<UserNotice>) -> Vec<UserNotice> {
        let mut out = Vec::new();
        while let Ok(notice) = rx.try_recv() {
            out.push(notice);
        }
        out
    }

    #[tokio::test]
    async fn test_sends_to_every_contact_with_location() {
        let transport = MockTransport::new(true, &[]);
        let (dispatcher, mut notices, _) = dispatcher(transport.clone(), LastKnownLocation::default());
        let contacts = numbers(&["9876543210", "9123456789"]);
        let location = GeoLocation::new(12.5, 77.25, LocationSource::Gps);

        let outcome = dispatcher.send_to_contacts(&event(), &contacts, Some(location)).await;

        assert_eq!(outcome, DispatchOutcome::Attempted { sent: 2, failed: 0 });
        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 2);
        for (_, parts) in sent.iter() {
            assert_eq!(
                parts,
                &vec!["EMERGENCY: Possible fall detected! Location: 12.5, 77.25".to_string()]
            );
        }
        let notices = drain(&mut notices);
        assert_eq!(notices.iter().filter(|n| matches!(n, UserNotice::SmsSent { .. })).count(), 2);
        assert_eq!(
            notices.last(),
            Some(&UserNotice::AlertVibration { duration_ms: ALERT_VIBRATION_MS })
        );
    }

    #[tokio::test]
    async fn test_unknown_location() {
        let transport = MockTransport::new(true, &[]);
        let (dispatcher, _, _) = dispatcher(transport.clone(), LastKnownLocation::default());

        dispatcher.send_to_contacts(&event(), &numbers(&["9876543210"]), None).await;

        assert_eq!(
            transport.sent.lock()[0].1,
            vec!["EMERGENCY: Possible fall detected! Location: Unknown".to_string()]
        );
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let transport = MockTransport::new(true, &["+919123456789"]);
        let (dispatcher, mut notices, _) = dispatcher(transport.clone(), LastKnownLocation::default());
        let contacts = numbers(&["9876543210", "9123456789", "9000000000"]);

        let outcome = dispatcher.send_to_contacts(&event(), &contacts, None).await;

        assert_eq!(outcome, DispatchOutcome::Attempted { sent: 2, failed: 1 });
        let mut delivered: Vec<String> =
            transport.sent.lock().iter().map(|(to, _)| to.clone()).collect();
        delivered.sort();
        assert_eq!(delivered, vec!["+919000000000", "+919876543210"]);

        let failed: Vec<UserNotice> = drain(&mut notices)
            .into_iter()
            .filter(|n| matches!(n, UserNotice::SmsFailed { .. }))
            .collect();
        assert_eq!(
            failed,
            vec![UserNotice::SmsFailed {
                contact: numbers(&["9123456789"]).remove(0),
                reason: "Failed to send SMS: radio off".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_no_contacts_sends_nothing() {
        let transport = MockTransport::new(true, &[]);
        let (dispatcher, mut notices, _) = dispatcher(transport.clone(), LastKnownLocation::default());

        let outcome = dispatcher.dispatch(&event()).await;

        assert_eq!(outcome, DispatchOutcome::NoContacts);
        assert!(transport.sent.lock().is_empty());
        assert_eq!(drain(&mut notices), vec![UserNotice::NoContacts]);
    }

    #[tokio::test]
    async fn test_permission_denied_sends_nothing() {
        let transport = MockTransport::new(false, &[]);
        let (dispatcher, mut notices, _) = dispatcher(transport.clone(), LastKnownLocation::default());

        let outcome =
            dispatcher.send_to_contacts(&event(), &numbers(&["9876543210"]), None).await;

        assert_eq!(outcome, DispatchOutcome::PermissionDenied);
        assert!(transport.sent.lock().is_empty());
        assert_eq!(drain(&mut notices), vec![UserNotice::SmsPermissionDenied]);
    }

    #[tokio::test]
    async fn test_dispatch_uses_book_and_location() {
        let transport = MockTransport::new(true, &[]);
        let location = LastKnownLocation::default()
            .with_provider(Box::new(StaticProvider::new(64.0, -22.0, LocationSource::Network)));
        let (dispatcher, _, book) = dispatcher(transport.clone(), location);
        book.add("9876543210").unwrap();

        let outcome = dispatcher.dispatch(&event()).await;

        assert_eq!(outcome, DispatchOutcome::Attempted { sent: 1, failed: 0 });
        let sent = transport.sent.lock();
        assert_eq!(sent[0].0, "+919876543210");
        assert_eq!(sent[0].1, vec!["EMERGENCY: Possible fall detected! Location: 64.0, -22.0"]);
    }

    #[tokio::test]
    async fn test_worker_drains_until_closed() {
        let transport = MockTransport::new(true, &[]);
        let (dispatcher, _, book) = dispatcher(transport.clone(), LastKnownLocation::default());
        book.add("9876543210").unwrap();
        let metrics = Arc::new(Metrics::new());

        let (tx, worker) = create_alert_worker(Arc::new(dispatcher), metrics, 4);
        tx.send(AlertCmd { event: event(), enqueued_at: Instant::now() }).await.unwrap();
        tx.send(AlertCmd { event: event(), enqueued_at: Instant::now() }).await.unwrap();
        drop(tx);

        worker.run().await;

        assert_eq!(transport.sent.lock().len(), 2);
    }
}
