//! Hand-off of password reset tokens to whatever reaches the user.

use tracing::info;

/// Receives each freshly issued reset token together with the account email.
///
/// Implementations own the outbound channel (mail, queue, ...). They must not
/// log the token.
pub trait ResetTokenDelivery: Send + Sync {
    fn deliver(&self, email: &str, token: &str) -> anyhow::Result<()>;
}

/// Used when no outbound channel is configured: the token is dropped and only
/// its issuance is recorded.
pub struct DiscardDelivery;

impl ResetTokenDelivery for DiscardDelivery {
    fn deliver(&self, email: &str, _token: &str) -> anyhow::Result<()> {
        info!(
            service = "password_reset",
            email_domain = email.rsplit_once('@').map(|(_, d)| d).unwrap_or(""),
            "No reset delivery configured, token discarded"
        );
        Ok(())
    }
}

/// Keeps every delivered token in memory.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingDelivery {
    sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl RecordingDelivery {
    pub fn last_token_for(&self, email: &str) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        sent.iter().rev().find(|(e, _)| e == email).map(|(_, t)| t.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[cfg(test)]
impl ResetTokenDelivery for RecordingDelivery {
    fn deliver(&self, email: &str, token: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((email.to_string(), token.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discard_delivery_accepts_any_token() {
        assert!(DiscardDelivery.deliver("a@x.com", "secret").is_ok());
        assert!(DiscardDelivery.deliver("not-an-email", "secret").is_ok());
    }

    #[test]
    fn test_recording_delivery_keeps_latest_per_email() {
        let delivery = RecordingDelivery::default();
        delivery.deliver("a@x.com", "one").unwrap();
        delivery.deliver("b@x.com", "two").unwrap();
        delivery.deliver("a@x.com", "three").unwrap();

        assert_eq!(delivery.count(), 3);
        assert_eq!(delivery.last_token_for("a@x.com").as_deref(), Some("three"));
        assert_eq!(delivery.last_token_for("c@x.com"), None);
    }
}
