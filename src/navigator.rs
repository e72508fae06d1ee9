//! Navigation for session teardown.
//!
//! When a refresh fails for good, no single caller is in a position to
//! handle "the whole session is gone". The session manager escalates to a
//! [`Navigator`] instead: it reports [`Event::SessionExpired`] and sends the
//! client to its login entry point.

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::events::Event;

/// Where the client is, and how to send it elsewhere.
pub trait Navigator: Send + Sync {
    /// Path the client currently shows.
    fn location(&self) -> String;

    /// Moves the client to `path`.
    fn navigate(&self, path: &str);

    /// Reports a session event. Ignored unless implemented.
    fn notify(&self, _event: Event) {}
}

/// Navigator that tracks its location and forwards events over a channel.
#[derive(Debug)]
pub struct ChannelNavigator {
    location: Mutex<String>,
    events: Option<mpsc::UnboundedSender<Event>>,
}

impl ChannelNavigator {
    /// Creates a navigator at `location`, returning the receiving end of
    /// its events.
    #[must_use]
    pub fn new(location: &str) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let navigator = Self {
            location: Mutex::new(location.to_owned()),
            events: Some(tx),
        };

        (navigator, rx)
    }

    /// Creates a navigator at `location` whose events nobody listens to.
    #[must_use]
    pub fn detached(location: &str) -> Self {
        Self {
            location: Mutex::new(location.to_owned()),
            events: None,
        }
    }

    fn send(&self, event: Event) {
        if let Some(ref events) = self.events {
            // A closed channel only means nobody listens anymore.
            let _ = events.send(event);
        }
    }
}

impl Navigator for ChannelNavigator {
    fn location(&self) -> String {
        self.location
            .lock()
            .map(|location| location.clone())
            .unwrap_or_default()
    }

    fn navigate(&self, path: &str) {
        debug!("navigating to {path}");
        if let Ok(mut location) = self.location.lock() {
            path.clone_into(&mut *location);
        }
        self.send(Event::Navigate(path.to_owned()));
    }

    fn notify(&self, event: Event) {
        self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigate_updates_location_and_emits() {
        let (navigator, mut events) = ChannelNavigator::new("/courses");
        assert_eq!(navigator.location(), "/courses");

        navigator.notify(Event::SessionExpired);
        navigator.navigate("/login");

        assert_eq!(navigator.location(), "/login");
        assert_eq!(events.try_recv().unwrap(), Event::SessionExpired);
        assert_eq!(events.try_recv().unwrap(), Event::Navigate("/login".to_owned()));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn detached_navigator_still_tracks_location() {
        let navigator = ChannelNavigator::detached("/");
        navigator.navigate("/profile");
        assert_eq!(navigator.location(), "/profile");
    }
}
