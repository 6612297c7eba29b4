// SPDX-License-Identifier: GPL-3.0-only

//! XDG desktop portal camera access over D-Bus
//!
//! Uses `org.freedesktop.portal.Camera` on the session bus, which works both
//! natively and inside a flatpak sandbox. `AccessCamera` answers through a
//! `Request` object whose `Response` signal carries the user's decision.

use crate::authorization::ConsentStatus;
use futures::StreamExt;
use std::collections::HashMap;
use tracing::{debug, info};
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

const PORTAL_DESTINATION: &str = "org.freedesktop.portal.Desktop";
const PORTAL_PATH: &str = "/org/freedesktop/portal/desktop";
const CAMERA_INTERFACE: &str = "org.freedesktop.portal.Camera";
const REQUEST_INTERFACE: &str = "org.freedesktop.portal.Request";

pub struct CameraPortal {
    connection: zbus::Connection,
}

impl CameraPortal {
    pub async fn connect() -> Result<Self, String> {
        let connection = zbus::Connection::session()
            .await
            .map_err(|e| format!("Failed to connect to session D-Bus: {}", e))?;
        Ok(Self { connection })
    }

    async fn camera_proxy(&self) -> Result<zbus::Proxy<'static>, String> {
        zbus::Proxy::new(&self.connection, PORTAL_DESTINATION, PORTAL_PATH, CAMERA_INTERFACE)
            .await
            .map_err(|e| format!("Failed to create camera portal proxy: {}", e))
    }

    /// `IsCameraPresent` property
    pub async fn is_camera_present(&self) -> Result<bool, String> {
        let proxy = self.camera_proxy().await?;
        let present: bool = proxy
            .get_property("IsCameraPresent")
            .await
            .map_err(|e| format!("Failed to read IsCameraPresent: {}", e))?;
        debug!(present, "Camera portal presence");
        Ok(present)
    }

    /// Ask the portal for camera access and wait for the user's answer
    pub async fn access_camera(&self) -> Result<ConsentStatus, String> {
        let token = format!("media_broker_{}", uuid::Uuid::new_v4().simple());
        let sender = self
            .connection
            .unique_name()
            .map(|name| name.as_str().to_string())
            .ok_or("D-Bus connection has no unique name")?;
        let request_path = request_path(&sender, &token);

        // Subscribe before the call so a fast answer is not missed
        let request = zbus::Proxy::new(
            &self.connection,
            PORTAL_DESTINATION,
            request_path.clone(),
            REQUEST_INTERFACE,
        )
        .await
        .map_err(|e| format!("Failed to create portal request proxy: {}", e))?;
        let mut responses = request
            .receive_signal("Response")
            .await
            .map_err(|e| format!("Failed to subscribe to portal response: {}", e))?;

        let mut options: HashMap<&str, Value> = HashMap::new();
        options.insert("handle_token", Value::new(token.as_str()));

        info!(request = %request_path, "Requesting camera access from portal");
        let handle: OwnedObjectPath = self
            .camera_proxy()
            .await?
            .call("AccessCamera", &(options,))
            .await
            .map_err(|e| format!("AccessCamera failed: {}", e))?;
        debug!(handle = %handle, "Portal request handle");

        let message = responses
            .next()
            .await
            .ok_or("Portal closed the request without answering")?;
        let body = message.body();
        let (code, _results): (u32, HashMap<String, OwnedValue>) = body
            .deserialize()
            .map_err(|e| format!("Malformed portal response: {}", e))?;

        let consent = consent_from_response(code);
        info!(code, consent = ?consent, "Camera portal answered");
        Ok(consent)
    }
}

/// Object path the portal uses for a request made by `sender` with `token`
pub fn request_path(sender: &str, token: &str) -> String {
    let sender = sender.trim_start_matches(':').replace('.', "_");
    format!("{}/request/{}/{}", PORTAL_PATH, sender, token)
}

/// Map a `Request.Response` code to consent
pub fn consent_from_response(code: u32) -> ConsentStatus {
    match code {
        0 => ConsentStatus::Granted,
        1 => ConsentStatus::Denied,
        _ => ConsentStatus::Restricted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_path_escapes_sender() {
        assert_eq!(
            request_path(":1.42", "media_broker_abc"),
            "/org/freedesktop/portal/desktop/request/1_42/media_broker_abc"
        );
    }

    #[test]
    fn test_response_codes() {
        assert_eq!(consent_from_response(0), ConsentStatus::Granted);
        assert_eq!(consent_from_response(1), ConsentStatus::Denied);
        assert_eq!(consent_from_response(2), ConsentStatus::Restricted);
    }
}
