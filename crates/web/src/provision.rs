//! First-time device provisioning
//!
//! Orchestrates the setup handshake: resolves the operator, materializes a
//! new device record with its long-lived credential, mints a single-use
//! registration token, and bundles everything into the setup payload the
//! flasher writes onto the device.

use esignage_common::{token, Database, Error, GlobalDefaults, Result, SetupPayload};
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct ProvisioningService {
    db: Database,
    seed_defaults: GlobalDefaults,
}

impl ProvisioningService {
    pub fn new(db: Database, seed_defaults: GlobalDefaults) -> Self {
        Self { db, seed_defaults }
    }

    /// Generate the setup bundle for a new device owned by `username`.
    ///
    /// The device row and the registration token are two independent
    /// persists. A crash between them leaves a device with no registration
    /// token; the orphan is harmless and the operator simply re-provisions.
    pub fn provision(&self, username: &str) -> Result<SetupPayload> {
        let operator = self
            .db
            .operator_by_username(username)?
            .ok_or_else(|| Error::NotFound {
                kind: "operator".to_string(),
                id: username.to_string(),
            })?;

        let defaults = self.db.global_defaults(&self.seed_defaults)?;

        let name = format!("ESP32-{}", Uuid::new_v4());
        let device = self
            .db
            .create_device(operator.id, &name, &token::new_opaque_token())?;

        let registration_token = token::new_opaque_token();
        self.db
            .create_registration_token(operator.id, &registration_token)?;

        info!(
            "Provisioned device {} for operator {}",
            device.id, operator.username
        );

        Ok(SetupPayload {
            wifi_ssid: defaults.wifi_ssid,
            wifi_password: defaults.wifi_password,
            ntp_server: defaults.ntp_server,
            server_domain: defaults.server_domain,
            registration_token,
            device_id: device.id,
            device_token: device.device_token,
        })
    }

    /// Consume a registration token, exactly once. An unknown token and an
    /// already-used one are indistinguishable to the caller.
    pub fn confirm_registration(&self, registration_token: &str) -> Result<()> {
        if self.db.consume_registration_token(registration_token)? {
            Ok(())
        } else {
            Err(Error::Unauthorized)
        }
    }
}
