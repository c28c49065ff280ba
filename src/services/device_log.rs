//! Device error reports and device events

use chrono::{NaiveDateTime, TimeZone, Timelike, Utc};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthorizedSession;
use crate::db::schemas::{DeviceErrorDoc, DeviceEventDoc, Metadata};
use crate::services::{field_int, field_str, field_text, record_json, DeviceService, Payload};
use crate::types::{HdbError, Result};

/// Layout of event times posted by devices (UTC)
pub const EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

fn record_name() -> String {
    Uuid::new_v4().simple().to_string()
}

fn unknown_device(sn: &str) -> HdbError {
    HdbError::NotFound(format!("Device {} not found.", sn))
}

impl DeviceService {
    /// Store an error reported by a device
    pub async fn add_device_error(&self, _session: &AuthorizedSession, data: &Payload) -> Result<Value> {
        let device = field_str(data, "device").ok_or_else(|| HdbError::missing_fields(&["device"]))?;
        if !self.devices.sn_exists(device).await? {
            return Err(unknown_device(device));
        }

        let error = DeviceErrorDoc {
            _id: None,
            metadata: Metadata::new(),
            name: record_name(),
            device: device.to_string(),
            error_type: field_text(data, "error_type"),
            error_key: field_text(data, "error_key"),
            error_level: field_int(data, "error_level")?,
            error_info: field_text(data, "error_info"),
            wechat_notify: field_int(data, "wechat_notify")?,
        };
        let error = self.devices.insert_error(error).await?;
        info!(device = %error.device, level = error.error_level, "Device error recorded");
        record_json(&error, &error.metadata)
    }

    /// Store an event emitted by a device, stamped with its current owner
    pub async fn add_device_event(&self, _session: &AuthorizedSession, data: &Payload) -> Result<Value> {
        let sn = field_str(data, "device").ok_or_else(|| HdbError::missing_fields(&["device"]))?;
        let Some(device) = self.devices.get_device(sn).await? else {
            return Err(unknown_device(sn));
        };
        let time = field_str(data, "time").ok_or_else(|| HdbError::missing_fields(&["time"]))?;

        let event = DeviceEventDoc {
            _id: None,
            metadata: Metadata::new(),
            name: record_name(),
            device: device.sn.clone(),
            event_level: field_int(data, "level")?,
            event_type: field_text(data, "type"),
            event_info: field_text(data, "info"),
            event_data: field_text(data, "data"),
            event_time: self.utc_to_local(time)?,
            event_device: Some(device.sn.clone()),
            event_source: field_text(data, "source"),
            owner_type: device.owner_type,
            owner_id: device.owner_id,
            owner_company: device.company,
            wechat_notify: 1,
        };
        let event = self.devices.insert_event(event).await?;
        info!(device = %event.device, time = %event.event_time, "Device event recorded");
        record_json(&event, &event.metadata)
    }

    /// Convert a device's UTC timestamp to local wall-clock text.
    /// Fractional seconds are kept only when non-zero.
    pub fn utc_to_local(&self, utc: &str) -> Result<String> {
        let naive = NaiveDateTime::parse_from_str(utc, EVENT_TIME_FORMAT)
            .map_err(|e| HdbError::BadRequest(format!("Invalid event time {}: {}", utc, e)))?;
        let local = Utc
            .from_utc_datetime(&naive)
            .with_timezone(&self.local_offset)
            .naive_local();
        let layout = if local.nanosecond() == 0 {
            "%Y-%m-%d %H:%M:%S"
        } else {
            "%Y-%m-%d %H:%M:%S%.6f"
        };
        Ok(local.format(layout).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{authorize, MemorySettings, RequestParams, Session};
    use crate::db::schemas::{DeviceDoc, OwnerType};
    use crate::store::MemoryStore;
    use chrono::FixedOffset;
    use serde_json::json;
    use std::sync::Arc;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    async fn session() -> AuthorizedSession {
        authorize(
            Session::for_user("hdb", RequestParams::new()),
            None,
            || None,
            &MemorySettings::new(None),
        )
        .await
        .unwrap()
    }

    fn fixture() -> (DeviceService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let mut dev = DeviceDoc::new("SN-1".into(), None);
        dev.owner_type = Some(OwnerType::User);
        dev.owner_id = Some("alice".into());
        store.put_device(dev);
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        (DeviceService::new(store.clone(), store.clone(), offset), store)
    }

    #[test]
    fn test_utc_to_local() {
        let (svc, _) = fixture();
        assert_eq!(svc.utc_to_local("2024-01-01 20:30:00").unwrap(), "2024-01-02 04:30:00");
        assert_eq!(
            svc.utc_to_local("2024-01-01 00:00:00.25").unwrap(),
            "2024-01-01 08:00:00.250000"
        );
        assert!(svc.utc_to_local("yesterday").is_err());
    }

    #[tokio::test]
    async fn test_add_device_error() {
        let (svc, store) = fixture();
        let s = session().await;

        let value = svc
            .add_device_error(
                &s,
                &payload(json!({"device": "SN-1", "error_type": "IO", "error_level": "3"})),
            )
            .await
            .unwrap();
        assert_eq!(value["error_level"], json!(3));
        assert_eq!(value["wechat_notify"], json!(0));
        assert!(value.get("_id").is_none());
        assert!(value["creation"].is_string());

        let stored = store.errors_for("SN-1");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].error_type.as_deref(), Some("IO"));

        let err = svc
            .add_device_error(&s, &payload(json!({"device": "SN-9"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Device SN-9 not found.");

        let err = svc.add_device_error(&s, &payload(json!({}))).await.unwrap_err();
        assert_eq!(err.to_string(), "Request fields not found. fields: device");
    }

    #[tokio::test]
    async fn test_add_device_event() {
        let (svc, store) = fixture();
        let s = session().await;

        let value = svc
            .add_device_event(
                &s,
                &payload(json!({
                    "device": "SN-1",
                    "time": "2024-05-01 16:00:00",
                    "level": 2,
                    "type": "SYS",
                    "info": "rebooted",
                    "data": {"uptime": 0},
                    "source": "kernel"
                })),
            )
            .await
            .unwrap();
        assert_eq!(value["event_time"], json!("2024-05-02 00:00:00"));
        assert_eq!(value["wechat_notify"], json!(1));
        assert_eq!(value["owner_id"], json!("alice"));
        assert_eq!(value["owner_type"], json!("User"));

        let stored = store.events_for("SN-1");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].event_level, 2);
        assert_eq!(stored[0].event_data.as_deref(), Some(r#"{"uptime":0}"#));
    }
}
