//! Frame dispatch — decodes one text frame and routes it by message type.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::envelope::{
    InboundMessage, SessionInfo, SubscriptionEvent, SubscriptionType, decode_envelope,
};
use crate::events::{ClientEvent, Notification, StreamOffline, StreamOnline};

/// What the receive loop should do after a frame.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Directive {
    /// Keep reading from the current socket.
    Continue,
    /// Tear down and reconnect to the given endpoint.
    Reconnect(Url),
}

/// Routes decoded envelopes to session state and the event channel.
pub(crate) struct Dispatcher {
    events: broadcast::Sender<ClientEvent>,
    session: Arc<Mutex<Option<SessionInfo>>>,
}

impl Dispatcher {
    pub(crate) fn new(
        events: broadcast::Sender<ClientEvent>,
        session: Arc<Mutex<Option<SessionInfo>>>,
    ) -> Self {
        Self { events, session }
    }

    /// Handle one complete text frame. Malformed frames are dropped.
    pub(crate) fn handle_frame(&self, text: &str) -> Directive {
        let envelope = match decode_envelope(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                return Directive::Continue;
            }
        };

        match envelope.message {
            InboundMessage::SessionWelcome(session) => {
                info!(session_id = %session.id, "session established");
                *self.session.lock() = Some(session.clone());
                self.emit(ClientEvent::SessionWelcome(session));
                Directive::Continue
            }
            InboundMessage::Notification(event) => {
                self.handle_notification(event);
                Directive::Continue
            }
            InboundMessage::SessionReconnect { reconnect_url } => {
                info!(url = %reconnect_url, "server requested reconnect");
                Directive::Reconnect(reconnect_url)
            }
            InboundMessage::SessionKeepalive => {
                trace!("keepalive");
                Directive::Continue
            }
            InboundMessage::Revocation {
                subscription_type,
                status,
            } => {
                warn!(?subscription_type, ?status, "subscription revoked");
                Directive::Continue
            }
            InboundMessage::Unrecognized(message_type) => {
                debug!(message_type = %message_type, "ignoring unrecognized message type");
                Directive::Continue
            }
        }
    }

    fn handle_notification(&self, event: SubscriptionEvent) {
        let notification = match event.subscription_type {
            SubscriptionType::StreamOnline => {
                match serde_json::from_value::<StreamOnline>(event.event) {
                    Ok(online) => {
                        info!(
                            broadcaster_user_id = %online.broadcaster_user_id,
                            "stream went online"
                        );
                        Notification::StreamOnline(online)
                    }
                    Err(e) => {
                        warn!(error = %e, "dropping malformed stream.online event");
                        return;
                    }
                }
            }
            SubscriptionType::StreamOffline => {
                match serde_json::from_value::<StreamOffline>(event.event) {
                    Ok(offline) => {
                        info!(
                            broadcaster_user_id = %offline.broadcaster_user_id,
                            "stream went offline"
                        );
                        Notification::StreamOffline(offline)
                    }
                    Err(e) => {
                        warn!(error = %e, "dropping malformed stream.offline event");
                        return;
                    }
                }
            }
            SubscriptionType::Other(tag) => {
                debug!(subscription_type = %tag, "unhandled subscription type");
                return;
            }
        };
        self.emit(ClientEvent::Notification(notification));
    }

    fn emit(&self, event: ClientEvent) {
        // no receivers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use eventsub_core::logging::capture_logs;
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;

    fn dispatcher() -> (
        Dispatcher,
        broadcast::Receiver<ClientEvent>,
        Arc<Mutex<Option<SessionInfo>>>,
    ) {
        let (tx, rx) = broadcast::channel(16);
        let session = Arc::new(Mutex::new(None));
        (Dispatcher::new(tx, Arc::clone(&session)), rx, session)
    }

    #[test]
    fn welcome_records_and_logs_session() {
        let (logs, _guard) = capture_logs();
        let (dispatcher, mut rx, session) = dispatcher();

        let directive = dispatcher.handle_frame(
            r#"{"metadata":{"message_type":"session_welcome"},"payload":{"session":{"id":"abc123"}}}"#,
        );

        assert_eq!(directive, Directive::Continue);
        assert_eq!(session.lock().as_ref().unwrap().id, "abc123");
        assert!(logs.has_field("session_id", "abc123"));
        assert_matches!(
            rx.try_recv(),
            Ok(ClientEvent::SessionWelcome(SessionInfo { id, .. })) if id == "abc123"
        );
        assert_matches!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn stream_online_emits_broadcaster_id() {
        let (dispatcher, mut rx, _) = dispatcher();
        let frame = json!({
            "metadata": {"message_type": "notification"},
            "payload": {
                "subscription": {"type": "stream.online"},
                "event": {"broadcaster_user_id": "42", "broadcaster_user_login": "someone", "type": "live"}
            }
        })
        .to_string();

        assert_eq!(dispatcher.handle_frame(&frame), Directive::Continue);
        let Ok(ClientEvent::Notification(Notification::StreamOnline(online))) = rx.try_recv()
        else {
            panic!("expected stream.online notification");
        };
        assert_eq!(online.broadcaster_user_id, "42");
        assert_eq!(online.broadcaster_user_login.as_deref(), Some("someone"));
        assert_eq!(online.stream_type.as_deref(), Some("live"));
    }

    #[test]
    fn stream_offline_emits_notification() {
        let (dispatcher, mut rx, _) = dispatcher();
        let frame = r#"{"metadata":{"message_type":"notification"},"payload":{"subscription":{"type":"stream.offline"},"event":{"broadcaster_user_id":"7"}}}"#;

        let _ = dispatcher.handle_frame(frame);
        assert_matches!(
            rx.try_recv(),
            Ok(ClientEvent::Notification(Notification::StreamOffline(StreamOffline { broadcaster_user_id, .. })))
                if broadcaster_user_id == "7"
        );
    }

    #[test]
    fn unhandled_subscription_type_is_logged_not_emitted() {
        let (logs, _guard) = capture_logs();
        let (dispatcher, mut rx, _) = dispatcher();
        let frame = r#"{"metadata":{"message_type":"notification"},"payload":{"subscription":{"type":"channel.follow"},"event":{}}}"#;

        assert_eq!(dispatcher.handle_frame(frame), Directive::Continue);
        assert_matches!(rx.try_recv(), Err(TryRecvError::Empty));
        assert!(logs.has_field("subscription_type", "channel.follow"));
    }

    #[test]
    fn stream_online_without_broadcaster_is_dropped() {
        let (dispatcher, mut rx, _) = dispatcher();
        let frame = r#"{"metadata":{"message_type":"notification"},"payload":{"subscription":{"type":"stream.online"},"event":{}}}"#;

        assert_eq!(dispatcher.handle_frame(frame), Directive::Continue);
        assert_matches!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn reconnect_returns_new_url() {
        let (dispatcher, _rx, _) = dispatcher();
        let directive = dispatcher.handle_frame(
            r#"{"metadata":{"message_type":"session_reconnect"},"payload":{"session":{"reconnect_url":"wss://new.example/ws"}}}"#,
        );
        assert_matches!(directive, Directive::Reconnect(url) if url.as_str() == "wss://new.example/ws");
    }

    #[test]
    fn reconnect_with_bad_url_keeps_connection() {
        let (dispatcher, _rx, _) = dispatcher();
        let directive = dispatcher.handle_frame(
            r#"{"metadata":{"message_type":"session_reconnect"},"payload":{"session":{"reconnect_url":"not a url"}}}"#,
        );
        assert_eq!(directive, Directive::Continue);
    }

    #[test]
    fn control_and_unknown_messages_continue_silently() {
        let (dispatcher, mut rx, session) = dispatcher();
        for frame in [
            r#"{"metadata":{"message_type":"session_keepalive"},"payload":{}}"#,
            r#"{"metadata":{"message_type":"revocation"},"payload":{"subscription":{"type":"stream.online","status":"user_removed"}}}"#,
            r#"{"metadata":{"message_type":"brand_new_type"}}"#,
        ] {
            assert_eq!(dispatcher.handle_frame(frame), Directive::Continue);
        }
        assert_matches!(rx.try_recv(), Err(TryRecvError::Empty));
        assert!(session.lock().is_none());
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let (logs, _guard) = capture_logs();
        let (dispatcher, mut rx, _) = dispatcher();
        for frame in ["", "{", "42", r#"{"payload":{"session":{"id":"x"}}}"#] {
            assert_eq!(dispatcher.handle_frame(frame), Directive::Continue);
        }
        assert_matches!(rx.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(logs.count_at_level(tracing::Level::WARN), 4);
    }

    #[test]
    fn events_without_subscribers_do_not_fail() {
        let (tx, rx) = broadcast::channel(4);
        drop(rx);
        let dispatcher = Dispatcher::new(tx, Arc::new(Mutex::new(None)));
        let directive = dispatcher.handle_frame(
            r#"{"metadata":{"message_type":"session_welcome"},"payload":{"session":{"id":"lonely"}}}"#,
        );
        assert_eq!(directive, Directive::Continue);
    }
}
