//! Device registration, lookup and updates
//!
//! Responses render the device's time-series database path as
//! `/{company domain}/{hdb}`, where an empty `hdb` stands for the serial
//! number.

use chrono::{FixedOffset, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::AuthorizedSession;
use crate::db::schemas::{DeviceDoc, OwnerType, TIMESTAMP_FORMAT};
use crate::services::{access, field_int, field_str, field_text, Payload};
use crate::store::{DeviceStore, DirectoryStore};
use crate::types::{HdbError, Result};

/// Device as returned by the HDB API
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    /// Record name; equal to the serial number
    pub name: String,
    pub sn: String,
    pub dev_name: String,
    pub description: Option<String>,
    pub company: Option<String>,
    pub owner_type: Option<OwnerType>,
    pub owner_id: Option<String>,
    pub hdb: Option<String>,
    pub status: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub use_beta: i64,
    pub creation: Option<String>,
    pub modified: Option<String>,
}

impl From<DeviceDoc> for DeviceInfo {
    fn from(doc: DeviceDoc) -> Self {
        Self {
            creation: doc.metadata.creation(),
            modified: doc.metadata.modified(),
            name: doc.sn.clone(),
            sn: doc.sn,
            dev_name: doc.dev_name,
            description: doc.description,
            company: doc.company,
            owner_type: doc.owner_type,
            owner_id: doc.owner_id,
            hdb: doc.hdb,
            status: doc.status,
            longitude: doc.longitude,
            latitude: doc.latitude,
            use_beta: doc.use_beta,
        }
    }
}

/// Devices reachable through one group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupDevices {
    pub group: String,
    pub devices: Vec<String>,
    pub role: Option<String>,
}

/// Every device a user can see, by how they can see it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceList {
    pub company_devices: Vec<GroupDevices>,
    pub private_devices: Vec<String>,
    pub shared_devices: Vec<GroupDevices>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchAddResult {
    pub done: Vec<String>,
    pub failed: Vec<String>,
}

/// Render the stored HDB path under the company domain
pub fn hdb_path(domain: Option<&str>, hdb: Option<&str>, sn: &str) -> String {
    let hdb = hdb.filter(|h| !h.is_empty()).unwrap_or(sn);
    match domain.filter(|d| !d.is_empty()) {
        Some(domain) => format!("/{}/{}", domain, hdb),
        None => format!("/{}", hdb),
    }
}

pub struct DeviceService {
    pub(crate) devices: Arc<dyn DeviceStore>,
    pub(crate) directory: Arc<dyn DirectoryStore>,
    /// Local time zone for timestamps handed to devices
    pub(crate) local_offset: FixedOffset,
}

impl DeviceService {
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        directory: Arc<dyn DirectoryStore>,
        local_offset: FixedOffset,
    ) -> Self {
        Self {
            devices,
            directory,
            local_offset,
        }
    }

    async fn company_domain(&self, company: Option<&str>) -> Result<Option<String>> {
        let Some(company) = company else {
            return Ok(None);
        };
        Ok(self
            .directory
            .get_company(company)
            .await?
            .and_then(|c| c.domain))
    }

    async fn render(&self, device: DeviceDoc) -> Result<DeviceInfo> {
        let domain = self.company_domain(device.company.as_deref()).await?;
        let path = hdb_path(domain.as_deref(), device.hdb.as_deref(), &device.sn);
        let mut info = DeviceInfo::from(device);
        info.hdb = Some(path);
        Ok(info)
    }

    async fn require_device(&self, sn: &str) -> Result<DeviceDoc> {
        self.devices
            .get_device(sn)
            .await?
            .ok_or_else(|| HdbError::device_not_found(sn))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Devices visible to `user`, or to the `user` request parameter
    pub async fn list_devices(
        &self,
        session: &AuthorizedSession,
        user: Option<&str>,
    ) -> Result<DeviceList> {
        let user = user
            .filter(|u| !u.is_empty())
            .or_else(|| session.param_str("user"))
            .ok_or_else(|| HdbError::BadRequest("Query string user does not specified".into()))?;
        debug!("List devices for user {}", user);

        let groups = self.directory.list_user_groups(user).await?;
        let companies = self.directory.list_user_companies(user).await?;

        let mut company_devices = Vec::with_capacity(groups.len());
        for group in groups {
            let devices = self
                .devices
                .devices_owned_by(OwnerType::CompanyGroup, &group.name)
                .await?;
            company_devices.push(GroupDevices {
                group: group.name,
                devices,
                role: group.role,
            });
        }

        let shared_devices = self
            .directory
            .share_groups_for_user(user)
            .await?
            .into_iter()
            .filter(|g| {
                g.company
                    .as_ref()
                    .map_or(true, |company| !companies.contains(company))
            })
            .map(|g| GroupDevices {
                group: g.name,
                devices: g.devices,
                role: g.role,
            })
            .collect();

        let private_devices = self.devices.devices_owned_by(OwnerType::User, user).await?;

        Ok(DeviceList {
            company_devices,
            private_devices,
            shared_devices,
        })
    }

    /// Whether the session user may perform `op` on the gateway `sn`
    /// reports through
    pub async fn access_device(
        &self,
        session: &AuthorizedSession,
        sn: &str,
        op: &str,
    ) -> Result<bool> {
        let Some(parent) = self.devices.device_parent(sn).await? else {
            return Ok(false);
        };
        let Some(device) = self.devices.get_device(&parent).await? else {
            return Ok(false);
        };
        access::has_permission(self.directory.as_ref(), &device, session.current_user(), op).await
    }

    pub async fn get_device(
        &self,
        session: &AuthorizedSession,
        sn: Option<&str>,
    ) -> Result<Option<DeviceInfo>> {
        let sn = required_sn(session, sn)?;
        match self.devices.get_device(sn).await? {
            Some(device) => Ok(Some(self.render(device).await?)),
            None => Ok(None),
        }
    }

    /// Database (company domain) holding the device's data
    pub async fn get_device_db(
        &self,
        session: &AuthorizedSession,
        sn: Option<&str>,
    ) -> Result<Option<String>> {
        let sn = required_sn(session, sn)?;
        let company = self.devices.get_device(sn).await?.and_then(|d| d.company);
        self.company_domain(company.as_deref()).await
    }

    pub async fn is_beta_enable(&self, _session: &AuthorizedSession, sn: &str) -> Result<Option<i64>> {
        Ok(self.devices.get_device(sn).await?.map(|d| d.use_beta))
    }

    pub async fn get_license_data(
        &self,
        _session: &AuthorizedSession,
        sn: Option<&str>,
    ) -> Result<Option<String>> {
        match sn.filter(|s| !s.is_empty()) {
            Some(sn) => self.devices.license_data(sn).await,
            None => Ok(None),
        }
    }

    /// Current local time
    pub fn get_time(&self, _session: &AuthorizedSession) -> String {
        Utc::now()
            .with_timezone(&self.local_offset)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Register a device. An already registered serial number yields the
    /// stored record as is.
    pub async fn add_device(&self, _session: &AuthorizedSession, data: &Payload) -> Result<DeviceInfo> {
        let device = self.ensure_device(data).await?;
        match device {
            Ensured::Existing(device) => Ok(DeviceInfo::from(device)),
            Ensured::Created(device) => self.render(device).await,
        }
    }

    async fn ensure_device(&self, data: &Payload) -> Result<Ensured> {
        let sn = field_str(data, "sn").ok_or_else(|| HdbError::missing_fields(&["sn"]))?;
        if let Some(existing) = self.devices.get_device(sn).await? {
            return Ok(Ensured::Existing(existing));
        }

        let mut device = DeviceDoc::new(sn.to_string(), field_text(data, "dev_name"));
        device.description = field_text(data, "description");
        device.hdb = field_text(data, "hdb");
        device.status = field_text(data, "status");
        device.use_beta = field_int(data, "use_beta")?;
        device.longitude = coordinate(data.get("longitude"), "longitude")?;
        device.latitude = coordinate(data.get("latitude"), "latitude")?;
        if let Some(owner_id) = field_str(data, "owner_id") {
            self.assign_owner(&mut device, owner_id, data).await?;
        }
        let device = self.devices.insert_device(device).await?;
        info!(sn = %device.sn, "Device registered");
        Ok(Ensured::Created(device))
    }

    pub async fn batch_add_device(
        &self,
        _session: &AuthorizedSession,
        data: &Payload,
    ) -> Result<BatchAddResult> {
        let sn_list = data
            .get("sn_list")
            .and_then(Value::as_array)
            .ok_or_else(|| HdbError::missing_fields(&["sn_list"]))?;

        let mut result = BatchAddResult::default();
        for item in sn_list {
            let sn = match item {
                Value::String(s) if !s.is_empty() => s.as_str(),
                other => {
                    result.failed.push(other.as_str().map_or_else(|| other.to_string(), str::to_string));
                    continue;
                }
            };
            if self.devices.sn_exists(sn).await? {
                result.failed.push(sn.to_string());
                continue;
            }
            match self.devices.insert_device(DeviceDoc::new(sn.to_string(), None)).await {
                Ok(device) => result.done.push(device.sn),
                Err(e) => {
                    warn!(sn = %sn, "Batch device insert failed: {}", e);
                    result.failed.push(sn.to_string());
                }
            }
        }
        Ok(result)
    }

    /// Register or refresh a device, then apply its owner and status
    pub async fn update_device(&self, session: &AuthorizedSession, data: &Payload) -> Result<DeviceInfo> {
        let mut device = self.ensure_device(data).await?.into_inner();

        let mut changed = false;
        if let Some(dev_name) = field_str(data, "dev_name") {
            if device.dev_name != dev_name {
                device.dev_name = dev_name.to_string();
                changed = true;
            }
        }
        let description = field_text(data, "description");
        if device.description != description {
            device.description = description;
            changed = true;
        }
        if changed {
            self.devices.save_device(&device).await?;
        }

        self.update_device_owner(session, data).await?;
        self.update_device_status(session, data).await
    }

    pub async fn update_device_owner(
        &self,
        _session: &AuthorizedSession,
        data: &Payload,
    ) -> Result<DeviceInfo> {
        let sn = field_str(data, "sn").ok_or_else(|| HdbError::missing_fields(&["sn"]))?;
        let mut device = self.require_device(sn).await?;

        let owner_id = field_str(data, "owner_id").map(str::to_string);
        if device.owner_id == owner_id {
            return self.render(device).await;
        }

        let previous = device.owner_id.clone();
        match owner_id {
            None => {
                device.owner_type = None;
                device.owner_id = None;
                device.company = None;
            }
            Some(owner_id) => self.assign_owner(&mut device, &owner_id, data).await?,
        }

        self.devices.save_device(&device).await?;
        info!(
            sn = %device.sn,
            from = ?previous,
            to = ?device.owner_id,
            "Device owner changed"
        );
        self.render(device).await
    }

    /// Set the owner named by `owner_type` in `data`; the company follows
    /// the owner
    async fn assign_owner(&self, device: &mut DeviceDoc, owner_id: &str, data: &Payload) -> Result<()> {
        let owner_type = field_str(data, "owner_type")
            .ok_or_else(|| HdbError::missing_fields(&["owner_type"]))?;
        let owner_type = OwnerType::parse(owner_type)
            .ok_or_else(|| HdbError::BadRequest(format!("Unknown owner type {}", owner_type)))?;
        device.company = match owner_type {
            OwnerType::CompanyGroup => Some(
                self.directory
                    .get_company_group(owner_id)
                    .await?
                    .ok_or_else(|| HdbError::NotFound(format!("Company group {} not found", owner_id)))?
                    .company,
            ),
            OwnerType::User => None,
        };
        device.owner_type = Some(owner_type);
        device.owner_id = Some(owner_id.to_string());
        Ok(())
    }

    pub async fn update_device_hdb(&self, _session: &AuthorizedSession, data: &Payload) -> Result<DeviceInfo> {
        let (Some(sn), Some(hdb)) = (field_str(data, "sn"), field_str(data, "hdb")) else {
            return Err(HdbError::missing_fields(&["sn", "hdb"]));
        };
        let mut device = self.require_device(sn).await?;
        if device.hdb.as_deref() != Some(hdb) {
            device.hdb = Some(hdb.to_string());
            self.devices.save_device(&device).await?;
        }
        self.render(device).await
    }

    pub async fn update_device_status(
        &self,
        _session: &AuthorizedSession,
        data: &Payload,
    ) -> Result<DeviceInfo> {
        let (Some(sn), Some(status)) = (field_str(data, "sn"), field_str(data, "status")) else {
            return Err(HdbError::missing_fields(&["sn", "status"]));
        };
        let mut device = self.require_device(sn).await?;
        device.status = Some(status.to_string());
        self.devices.save_device(&device).await?;
        self.render(device).await
    }

    pub async fn update_device_name(&self, _session: &AuthorizedSession, data: &Payload) -> Result<DeviceInfo> {
        let (Some(sn), Some(name)) = (field_str(data, "sn"), field_str(data, "name")) else {
            return Err(HdbError::missing_fields(&["sn", "name"]));
        };
        let mut device = self.require_device(sn).await?;
        device.dev_name = name.to_string();
        self.devices.save_device(&device).await?;
        self.render(device).await
    }

    /// Position is an object or a JSON string with `long` and `lati`
    pub async fn update_device_position(
        &self,
        _session: &AuthorizedSession,
        data: &Payload,
    ) -> Result<DeviceInfo> {
        let position = match data.get("position") {
            Some(Value::String(raw)) if !raw.is_empty() => Some(serde_json::from_str::<Value>(raw)?),
            Some(Value::Object(map)) if !map.is_empty() => Some(Value::Object(map.clone())),
            _ => None,
        };
        let (Some(sn), Some(position)) = (field_str(data, "sn"), position) else {
            return Err(HdbError::missing_fields(&["sn", "position"]));
        };

        let mut device = self.require_device(sn).await?;
        device.longitude = coordinate(position.get("long"), "long")?;
        device.latitude = coordinate(position.get("lati"), "lati")?;
        self.devices.save_device(&device).await?;
        self.render(device).await
    }
}

/// Outcome of registering a serial number
enum Ensured {
    Existing(DeviceDoc),
    Created(DeviceDoc),
}

impl Ensured {
    fn into_inner(self) -> DeviceDoc {
        match self {
            Ensured::Existing(device) | Ensured::Created(device) => device,
        }
    }
}

fn required_sn<'a>(session: &'a AuthorizedSession, sn: Option<&'a str>) -> Result<&'a str> {
    sn.filter(|s| !s.is_empty())
        .or_else(|| session.param_str("sn"))
        .ok_or_else(|| HdbError::missing_fields(&["sn"]))
}

fn coordinate(value: Option<&Value>, key: &str) -> Result<Option<f64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| HdbError::BadRequest(format!("Invalid position {}: {}", key, s))),
        Some(other) => Err(HdbError::BadRequest(format!(
            "Invalid position {}: {}",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{authorize, MemorySettings, RequestParams, Session};
    use crate::db::schemas::{CompanyDoc, CompanyGroupDoc, LicenseDoc, ShareGroupDoc};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    async fn session(user: &str, params: Value) -> AuthorizedSession {
        let settings = MemorySettings::new(None);
        authorize(Session::for_user(user, payload(params)), None, || None, &settings)
            .await
            .unwrap()
    }

    fn fixture() -> (DeviceService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.put_company(CompanyDoc::new("ACME", Some("carol"), Some("acme.io")));
        store.put_company(CompanyDoc::new("Other", None, Some("other.io")));
        store.put_company_group(
            CompanyGroupDoc::new("G-1", "Ops", "ACME").with_member("alice", Some("Admin")),
        );
        store.put_share_group(ShareGroupDoc {
            name: "SH-1".into(),
            company: Some("Other".into()),
            role: Some("Viewer".into()),
            users: vec!["alice".into()],
            devices: vec!["SN-OTHER".into()],
            ..Default::default()
        });
        store.put_share_group(ShareGroupDoc {
            name: "SH-2".into(),
            company: Some("ACME".into()),
            users: vec!["alice".into()],
            devices: vec!["SN-ACME".into()],
            ..Default::default()
        });

        let mut group_dev = DeviceDoc::new("SN-G".into(), None);
        group_dev.owner_type = Some(OwnerType::CompanyGroup);
        group_dev.owner_id = Some("G-1".into());
        group_dev.company = Some("ACME".into());
        store.put_device(group_dev);

        let mut private_dev = DeviceDoc::new("SN-P".into(), Some("Pump".into()));
        private_dev.owner_type = Some(OwnerType::User);
        private_dev.owner_id = Some("alice".into());
        private_dev.hdb = Some("pump-db".into());
        private_dev.use_beta = 1;
        store.put_device(private_dev);

        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let svc = DeviceService::new(store.clone(), store.clone(), offset);
        (svc, store)
    }

    #[test]
    fn test_hdb_path() {
        assert_eq!(hdb_path(Some("acme.io"), Some("db1"), "SN"), "/acme.io/db1");
        assert_eq!(hdb_path(Some("acme.io"), Some(""), "SN"), "/acme.io/SN");
        assert_eq!(hdb_path(Some("acme.io"), None, "SN"), "/acme.io/SN");
        assert_eq!(hdb_path(None, Some("db1"), "SN"), "/db1");
        assert_eq!(hdb_path(Some(""), None, "SN"), "/SN");
    }

    #[tokio::test]
    async fn test_list_devices() {
        let (svc, _) = fixture();
        let s = session("hdb", json!({})).await;

        let list = svc.list_devices(&s, Some("alice")).await.unwrap();
        assert_eq!(
            list.company_devices,
            vec![GroupDevices {
                group: "G-1".into(),
                devices: vec!["SN-G".into()],
                role: Some("Admin".into()),
            }]
        );
        assert_eq!(list.private_devices, vec!["SN-P"]);
        // SH-2 belongs to alice's own company
        assert_eq!(list.shared_devices.len(), 1);
        assert_eq!(list.shared_devices[0].group, "SH-1");
        assert_eq!(list.shared_devices[0].role.as_deref(), Some("Viewer"));
    }

    #[tokio::test]
    async fn test_list_devices_needs_user() {
        let (svc, _) = fixture();
        let s = session("hdb", json!({})).await;
        let err = svc.list_devices(&s, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Query string user does not specified");

        let s = session("hdb", json!({"user": "alice"})).await;
        assert_eq!(svc.list_devices(&s, None).await.unwrap().private_devices, vec!["SN-P"]);
    }

    #[tokio::test]
    async fn test_get_device_renders_hdb() {
        let (svc, _) = fixture();
        let s = session("hdb", json!({"sn": "SN-G"})).await;

        let dev = svc.get_device(&s, None).await.unwrap().unwrap();
        assert_eq!(dev.hdb.as_deref(), Some("/acme.io/SN-G"));
        assert_eq!(dev.name, "SN-G");

        let dev = svc.get_device(&s, Some("SN-P")).await.unwrap().unwrap();
        assert_eq!(dev.hdb.as_deref(), Some("/pump-db"));

        assert!(svc.get_device(&s, Some("SN-NONE")).await.unwrap().is_none());

        let bare = session("hdb", json!({})).await;
        let err = svc.get_device(&bare, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Request fields not found. fields: sn");
    }

    #[tokio::test]
    async fn test_device_db_beta_and_license() {
        let (svc, store) = fixture();
        let s = session("hdb", json!({})).await;

        assert_eq!(svc.get_device_db(&s, Some("SN-G")).await.unwrap().as_deref(), Some("acme.io"));
        assert_eq!(svc.get_device_db(&s, Some("SN-P")).await.unwrap(), None);
        assert_eq!(svc.is_beta_enable(&s, "SN-P").await.unwrap(), Some(1));
        assert_eq!(svc.is_beta_enable(&s, "SN-G").await.unwrap(), Some(0));
        assert_eq!(svc.is_beta_enable(&s, "SN-NONE").await.unwrap(), None);

        store.put_license(LicenseDoc {
            name: "SN-P".into(),
            enabled: true,
            license_data: Some("LICENSE".into()),
            ..Default::default()
        });
        assert_eq!(
            svc.get_license_data(&s, Some("SN-P")).await.unwrap().as_deref(),
            Some("LICENSE")
        );
        assert_eq!(svc.get_license_data(&s, None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_time_format() {
        let (svc, _) = fixture();
        let s = session("hdb", json!({})).await;
        let now = svc.get_time(&s);
        assert!(chrono::NaiveDateTime::parse_from_str(&now, TIMESTAMP_FORMAT).is_ok());
        assert_eq!(now.len(), "2024-01-01 00:00:00.000000".len());
    }

    #[tokio::test]
    async fn test_add_device() {
        let (svc, store) = fixture();
        let s = session("hdb", json!({})).await;

        let dev = svc.add_device(&s, &payload(json!({"sn": "SN-NEW"}))).await.unwrap();
        assert_eq!(dev.dev_name, "SN-NEW");
        assert_eq!(dev.hdb.as_deref(), Some("/SN-NEW"));
        assert!(store.get_device("SN-NEW").await.unwrap().is_some());

        // Existing devices come back as stored
        let dev = svc
            .add_device(&s, &payload(json!({"sn": "SN-P", "dev_name": "Renamed"})))
            .await
            .unwrap();
        assert_eq!(dev.dev_name, "Pump");
        assert_eq!(dev.hdb.as_deref(), Some("pump-db"));

        let err = svc.add_device(&s, &payload(json!({}))).await.unwrap_err();
        assert_eq!(err.to_string(), "Request fields not found. fields: sn");
    }

    #[tokio::test]
    async fn test_add_device_keeps_posted_owner_and_position() {
        let (svc, store) = fixture();
        let s = session("hdb", json!({})).await;

        let dev = svc
            .add_device(
                &s,
                &payload(json!({
                    "sn": "SN-9",
                    "owner_type": "User",
                    "owner_id": "bob",
                    "use_beta": 1,
                    "longitude": 1.5,
                    "latitude": "39.9"
                })),
            )
            .await
            .unwrap();
        assert_eq!(dev.owner_type, Some(OwnerType::User));
        assert_eq!(dev.owner_id.as_deref(), Some("bob"));
        assert_eq!(dev.company, None);
        assert_eq!(dev.use_beta, 1);
        assert_eq!(dev.longitude, Some(1.5));
        assert_eq!(dev.latitude, Some(39.9));

        let dev = svc
            .add_device(
                &s,
                &payload(json!({"sn": "SN-10", "owner_type": "Cloud Company Group", "owner_id": "G-1"})),
            )
            .await
            .unwrap();
        assert_eq!(dev.company.as_deref(), Some("ACME"));
        assert_eq!(dev.hdb.as_deref(), Some("/acme.io/SN-10"));

        let dev = svc
            .add_device(&s, &payload(json!({"sn": "SN-11", "owner_type": "User"})))
            .await
            .unwrap();
        assert_eq!(dev.owner_id, None);

        let err = svc
            .add_device(
                &s,
                &payload(json!({"sn": "SN-12", "owner_type": "Cloud Company Group", "owner_id": "G-404"})),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), hyper::StatusCode::NOT_FOUND);
        assert!(store.get_device("SN-12").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_batch_add_device() {
        let (svc, _) = fixture();
        let s = session("hdb", json!({})).await;

        let result = svc
            .batch_add_device(&s, &payload(json!({"sn_list": ["SN-A", "SN-P", "SN-B", "SN-A"]})))
            .await
            .unwrap();
        assert_eq!(result.done, vec!["SN-A", "SN-B"]);
        assert_eq!(result.failed, vec!["SN-P", "SN-A"]);

        let err = svc.batch_add_device(&s, &payload(json!({}))).await.unwrap_err();
        assert_eq!(err.to_string(), "Request fields not found. fields: sn_list");
    }

    #[tokio::test]
    async fn test_update_device_owner() {
        let (svc, store) = fixture();
        let s = session("hdb", json!({})).await;

        let dev = svc
            .update_device_owner(
                &s,
                &payload(json!({"sn": "SN-P", "owner_type": "Cloud Company Group", "owner_id": "G-1"})),
            )
            .await
            .unwrap();
        assert_eq!(dev.company.as_deref(), Some("ACME"));
        assert_eq!(dev.owner_type, Some(OwnerType::CompanyGroup));
        assert_eq!(dev.hdb.as_deref(), Some("/acme.io/pump-db"));

        let dev = svc
            .update_device_owner(&s, &payload(json!({"sn": "SN-P", "owner_id": ""})))
            .await
            .unwrap();
        assert_eq!(dev.owner_id, None);
        assert_eq!(dev.company, None);
        let stored = store.get_device("SN-P").await.unwrap().unwrap();
        assert_eq!(stored.owner_type, None);

        let err = svc
            .update_device_owner(&s, &payload(json!({"sn": "SN-NONE", "owner_id": "x"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Device is not found. SN:SN-NONE");

        let err = svc
            .update_device_owner(
                &s,
                &payload(json!({"sn": "SN-P", "owner_type": "Cloud Company", "owner_id": "x"})),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), hyper::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_device_fields() {
        let (svc, store) = fixture();
        let s = session("hdb", json!({})).await;

        let dev = svc
            .update_device_hdb(&s, &payload(json!({"sn": "SN-G", "hdb": "ts1"})))
            .await
            .unwrap();
        assert_eq!(dev.hdb.as_deref(), Some("/acme.io/ts1"));

        let err = svc
            .update_device_status(&s, &payload(json!({"sn": "SN-G"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Request fields not found. fields: sn\tstatus");

        svc.update_device_status(&s, &payload(json!({"sn": "SN-G", "status": "ONLINE"})))
            .await
            .unwrap();
        svc.update_device_name(&s, &payload(json!({"sn": "SN-G", "name": "Gateway"})))
            .await
            .unwrap();
        svc.update_device_position(
            &s,
            &payload(json!({"sn": "SN-G", "position": "{\"long\": 116.4, \"lati\": \"39.9\"}"})),
        )
        .await
        .unwrap();

        let stored = store.get_device("SN-G").await.unwrap().unwrap();
        assert_eq!(stored.hdb.as_deref(), Some("ts1"));
        assert_eq!(stored.status.as_deref(), Some("ONLINE"));
        assert_eq!(stored.dev_name, "Gateway");
        assert_eq!(stored.longitude, Some(116.4));
        assert_eq!(stored.latitude, Some(39.9));

        svc.update_device_position(&s, &payload(json!({"sn": "SN-G", "position": {"long": 1.5}})))
            .await
            .unwrap();
        let stored = store.get_device("SN-G").await.unwrap().unwrap();
        assert_eq!(stored.longitude, Some(1.5));
        assert_eq!(stored.latitude, None);
    }

    #[tokio::test]
    async fn test_update_device() {
        let (svc, store) = fixture();
        let s = session("hdb", json!({})).await;

        let dev = svc
            .update_device(
                &s,
                &payload(json!({
                    "sn": "SN-U",
                    "dev_name": "Unit",
                    "description": "roof",
                    "owner_type": "User",
                    "owner_id": "alice",
                    "status": "ONLINE"
                })),
            )
            .await
            .unwrap();
        assert_eq!(dev.dev_name, "Unit");
        assert_eq!(dev.status.as_deref(), Some("ONLINE"));
        assert_eq!(dev.owner_id.as_deref(), Some("alice"));

        svc.update_device(
            &s,
            &payload(json!({"sn": "SN-U", "dev_name": "Unit 2", "owner_id": "alice", "status": "OFFLINE"})),
        )
        .await
        .unwrap();
        let stored = store.get_device("SN-U").await.unwrap().unwrap();
        assert_eq!(stored.dev_name, "Unit 2");
        assert_eq!(stored.description, None);
        assert_eq!(stored.status.as_deref(), Some("OFFLINE"));
    }

    #[tokio::test]
    async fn test_access_device() {
        let (svc, store) = fixture();
        store.set_parent("SN-G.child", "SN-G");
        store.set_parent("SN-P.child", "SN-P");

        let alice = session("alice", json!({})).await;
        assert!(svc.access_device(&alice, "SN-G.child", "read").await.unwrap());
        assert!(svc.access_device(&alice, "SN-P.child", "write").await.unwrap());
        assert!(!svc.access_device(&alice, "SN-NONE", "read").await.unwrap());

        let bob = session("bob", json!({})).await;
        assert!(!svc.access_device(&bob, "SN-G.child", "read").await.unwrap());
    }
}
