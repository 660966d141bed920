//! Device configuration lookup
//!
//! Validates a presented device credential and projects the device record
//! plus the shared network defaults into the configuration payload. Strictly
//! read-only; every call stands on its own.

use esignage_common::{
    token, ConfigPayload, Database, Error, GlobalDefaults, MessagePayload, Result,
};

#[derive(Clone)]
pub struct ConfigurationService {
    db: Database,
    seed_defaults: GlobalDefaults,
}

impl ConfigurationService {
    pub fn new(db: Database, seed_defaults: GlobalDefaults) -> Self {
        Self { db, seed_defaults }
    }

    /// Build the configuration payload for a device, authenticating the
    /// request with the device's stored credential. The `Unauthorized` error
    /// carries one fixed message regardless of what mismatched.
    pub fn configuration(&self, device_id: i64, presented_token: &str) -> Result<ConfigPayload> {
        let device = self.db.device(device_id)?.ok_or_else(|| Error::NotFound {
            kind: "device".to_string(),
            id: device_id.to_string(),
        })?;

        if !token::tokens_match(presented_token, &device.device_token) {
            return Err(Error::Unauthorized);
        }

        let defaults = self.db.global_defaults(&self.seed_defaults)?;
        let messages = self
            .db
            .messages_for_device(device.id)?
            .iter()
            .map(MessagePayload::from)
            .collect();

        Ok(ConfigPayload {
            wifi_ssid: defaults.wifi_ssid,
            wifi_password: defaults.wifi_password,
            ntp_server: defaults.ntp_server,
            server_domain: defaults.server_domain,
            device_id: device.id,
            device_token: device.device_token,
            update_interval_seconds: device.update_interval_seconds,
            rotate_interval_seconds: device.rotate_interval_seconds,
            messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esignage_common::token::new_opaque_token;

    fn seed() -> GlobalDefaults {
        GlobalDefaults {
            wifi_ssid: "signage-net".to_string(),
            wifi_password: "hunter2".to_string(),
            ntp_server: "pool.ntp.org".to_string(),
            server_domain: "signage.example.com".to_string(),
        }
    }

    fn fixture() -> (Database, ConfigurationService, i64, String) {
        let db = Database::open_memory().unwrap();
        let op = db.create_operator("alice").unwrap();
        let device_token = new_opaque_token();
        let device = db.create_device(op.id, "lobby", &device_token).unwrap();
        let svc = ConfigurationService::new(db.clone(), seed());
        (db, svc, device.id, device_token)
    }

    #[test]
    fn test_configuration_with_valid_token() {
        let (db, svc, device_id, device_token) = fixture();
        db.add_message(device_id, "welcome", 2, false).unwrap();
        db.add_message(device_id, "closing at 6pm", 1, true).unwrap();

        let payload = svc.configuration(device_id, &device_token).unwrap();
        assert_eq!(payload.device_id, device_id);
        assert_eq!(payload.device_token, device_token);
        assert_eq!(payload.update_interval_seconds, 60);
        assert_eq!(payload.rotate_interval_seconds, 10);
        assert_eq!(payload.wifi_ssid, "signage-net");

        let texts: Vec<&str> = payload.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["welcome", "closing at 6pm"]);
        assert!(payload.messages[1].scroll);
    }

    #[test]
    fn test_configuration_wrong_token() {
        let (_db, svc, device_id, _token) = fixture();
        let err = svc.configuration(device_id, "wrong").unwrap_err();
        assert!(matches!(err, Error::Unauthorized));

        let err = svc.configuration(device_id, "").unwrap_err();
        assert!(matches!(err, Error::Unauthorized));
    }

    #[test]
    fn test_configuration_unknown_device() {
        let (_db, svc, _device_id, token) = fixture();
        let err = svc.configuration(999, &token).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_empty_messages_is_empty_list() {
        let (_db, svc, device_id, token) = fixture();
        let payload = svc.configuration(device_id, &token).unwrap();
        assert!(payload.messages.is_empty());

        // The wire form carries an empty array, not an absent field
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["messages"], serde_json::json!([]));
    }

    #[test]
    fn test_repeated_reads_are_identical() {
        let (db, svc, device_id, token) = fixture();
        db.add_message(device_id, "welcome", 1, false).unwrap();

        let first = svc.configuration(device_id, &token).unwrap();
        let second = svc.configuration(device_id, &token).unwrap();
        assert_eq!(first, second);
    }
}
