//! In-memory appliance used by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use serde_json::{Value, json};

use bayward_core::client::{
    ALLOCATION_RACE_CODE, AvailableTarget, PowerRequest, ProfileService, RemoteError,
    ResourceKind, TargetQuery,
};
use bayward_core::document::ProfileDocument;

pub const PROFILE_URI: &str = "/rest/server-profiles/94B55683-173F-4B36-8FA6-EC250BA2328B";
pub const CREATED_URI: &str = "/rest/server-profiles/57d3af2a-b6d2-4446-8645-f38dd808ea490";
pub const HARDWARE_URI: &str = "/rest/server-hardware/31393736-3831-4753-567h-30335837524E";
pub const HARDWARE_TYPE_URI: &str = "/rest/server-hardware-types/94B55683-173F-4B36-8FA6-EC250BA2328B";
pub const ENCLOSURE_GROUP_URI: &str = "/rest/enclosure-groups/ad5e9e88-b858-4935-ba58-017d60a17c89";
pub const TEMPLATE_URI: &str = "/rest/server-profile-templates/9a156b04-fce8-40b0-b0cd-92ced1311dda";

/// A call made against the fake, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ProfileByName(String),
    AvailableTargets(TargetQuery),
    HardwareByName(String),
    HardwareByUri(String),
    TemplateByName(String),
    TemplateByUri(String),
    NewProfileFromTemplate(String),
    FindUriByName(ResourceKind, String),
    Create(ProfileDocument),
    Update(ProfileDocument, String),
    Patch {
        uri: String,
        operation: String,
        path: String,
        value: Value,
    },
    Delete(ProfileDocument),
    SetPowerState(String, PowerRequest),
    CompliancePreview(String),
}

pub fn doc(value: Value) -> ProfileDocument {
    value
        .as_object()
        .cloned()
        .expect("fixture must be a JSON object")
}

pub fn basic_profile() -> ProfileDocument {
    doc(json!({
        "name": "Server-Template-7000",
        "serverHardwareTypeUri": HARDWARE_TYPE_URI,
        "enclosureGroupUri": ENCLOSURE_GROUP_URI,
        "uri": PROFILE_URI
    }))
}

pub fn created_basic_profile() -> ProfileDocument {
    doc(json!({
        "affinity": "Bay",
        "bios": {"manageBios": false, "overriddenSettings": []},
        "boot": {"manageBoot": false, "order": []},
        "bootMode": {"manageMode": false, "mode": null, "pxeBootPolicy": null},
        "category": "server-profile-templates",
        "enclosureGroupUri": "/rest/enclosure-groups/ad5e9e88-b858-4935-ba58-017d60a17c89",
        "name": "Server-Template-7000",
        "serialNumber": "VCGGU8800W",
        "serialNumberType": "Virtual",
        "serverHardwareTypeUri": HARDWARE_TYPE_URI,
        "serverHardwareUri": "/rest/server-hardware/37333036-3831-76jh-4831-303658389766",
        "serverProfileTemplateUri": TEMPLATE_URI,
        "templateCompliance": "Compliant",
        "status": "OK",
        "type": "ServerProfileV5",
        "uri": CREATED_URI,
        "wwnType": "Virtual"
    }))
}

pub fn available_targets() -> Vec<AvailableTarget> {
    vec![
        AvailableTarget {
            server_hardware_uri: Some(String::new()),
            enclosure_bay: Some(1),
            enclosure_uri: Some("/rest/enclosures/09SGH100X6J1".to_string()),
        },
        AvailableTarget {
            server_hardware_uri: Some(HARDWARE_URI.to_string()),
            enclosure_bay: Some(3),
            enclosure_uri: Some("/rest/enclosures/09SGH100X6J1".to_string()),
        },
        AvailableTarget {
            server_hardware_uri: Some(
                "/rest/server-hardware/31393736-3831-4753-567h-30335837526E".to_string(),
            ),
            enclosure_bay: Some(4),
            enclosure_uri: Some("/rest/enclosures/09SGH100X6J1".to_string()),
        },
    ]
}

pub fn race_error() -> RemoteError {
    RemoteError::task(Some(ALLOCATION_RACE_CODE), "Fake message error")
}

/// Scripted appliance that records every call.
pub struct FakeService {
    pub profile: RefCell<Option<ProfileDocument>>,
    pub targets: RefCell<Vec<AvailableTarget>>,
    pub hardware: RefCell<HashMap<String, ProfileDocument>>,
    pub templates: RefCell<HashMap<String, ProfileDocument>>,
    pub new_profile: RefCell<ProfileDocument>,
    pub named: RefCell<HashMap<(ResourceKind, String), String>>,
    /// Results returned by `create`, in order; afterwards `create_default`.
    pub create_script: RefCell<VecDeque<Result<ProfileDocument, RemoteError>>>,
    pub create_default: RefCell<Result<ProfileDocument, RemoteError>>,
    pub write_result: RefCell<ProfileDocument>,
    pub preview: RefCell<Value>,
    pub calls: RefCell<Vec<Call>>,
    targets_fetched: Cell<usize>,
}

impl Default for FakeService {
    fn default() -> Self {
        Self {
            profile: RefCell::new(None),
            targets: RefCell::new(Vec::new()),
            hardware: RefCell::new(HashMap::new()),
            templates: RefCell::new(HashMap::new()),
            new_profile: RefCell::new(ProfileDocument::new()),
            named: RefCell::new(HashMap::new()),
            create_script: RefCell::new(VecDeque::new()),
            create_default: RefCell::new(Ok(created_basic_profile())),
            write_result: RefCell::new(created_basic_profile()),
            preview: RefCell::new(json!({"isOnlineUpdate": true})),
            calls: RefCell::new(Vec::new()),
            targets_fetched: Cell::new(0),
        }
    }
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(profile: ProfileDocument) -> Self {
        let fake = Self::default();
        *fake.profile.borrow_mut() = Some(profile);
        fake
    }

    pub fn add_hardware(&self, name: &str, uri: &str) {
        self.hardware
            .borrow_mut()
            .insert(name.to_string(), doc(json!({"name": name, "uri": uri})));
    }

    pub fn add_template(&self, name: &str, uri: &str) {
        self.templates
            .borrow_mut()
            .insert(name.to_string(), doc(json!({"name": name, "uri": uri})));
    }

    pub fn add_named(&self, kind: ResourceKind, name: &str, uri: &str) {
        self.named
            .borrow_mut()
            .insert((kind, name.to_string()), uri.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn creates(&self) -> Vec<ProfileDocument> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Create(document) => Some(document),
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<(ProfileDocument, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Update(document, uri) => Some((document, uri)),
                _ => None,
            })
            .collect()
    }

    pub fn power_calls(&self) -> Vec<(String, PowerRequest)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SetPowerState(uri, request) => Some((uri, request)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|call| predicate(call)).count()
    }

    pub fn targets_fetched(&self) -> usize {
        self.targets_fetched.get()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl ProfileService for FakeService {
    fn profile_by_name(&self, name: &str) -> Result<Option<ProfileDocument>, RemoteError> {
        self.record(Call::ProfileByName(name.to_string()));
        Ok(self.profile.borrow().clone())
    }

    fn available_targets(&self, query: &TargetQuery) -> Result<Vec<AvailableTarget>, RemoteError> {
        self.record(Call::AvailableTargets(query.clone()));
        self.targets_fetched.set(self.targets_fetched.get() + 1);
        Ok(self.targets.borrow().clone())
    }

    fn hardware_by_name(&self, name: &str) -> Result<Option<ProfileDocument>, RemoteError> {
        self.record(Call::HardwareByName(name.to_string()));
        Ok(self.hardware.borrow().get(name).cloned())
    }

    fn hardware_by_uri(&self, uri: &str) -> Result<ProfileDocument, RemoteError> {
        self.record(Call::HardwareByUri(uri.to_string()));
        Ok(doc(json!({"uri": uri, "powerState": "On"})))
    }

    fn template_by_name(&self, name: &str) -> Result<Option<ProfileDocument>, RemoteError> {
        self.record(Call::TemplateByName(name.to_string()));
        Ok(self.templates.borrow().get(name).cloned())
    }

    fn template_by_uri(&self, uri: &str) -> Result<ProfileDocument, RemoteError> {
        self.record(Call::TemplateByUri(uri.to_string()));
        Ok(doc(json!({"name": "template", "uri": uri})))
    }

    fn new_profile_from_template(
        &self,
        template_uri: &str,
    ) -> Result<ProfileDocument, RemoteError> {
        self.record(Call::NewProfileFromTemplate(template_uri.to_string()));
        Ok(self.new_profile.borrow().clone())
    }

    fn find_uri_by_name(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Option<String>, RemoteError> {
        self.record(Call::FindUriByName(kind, name.to_string()));
        Ok(self.named.borrow().get(&(kind, name.to_string())).cloned())
    }

    fn create(&self, profile: &ProfileDocument) -> Result<ProfileDocument, RemoteError> {
        self.record(Call::Create(profile.clone()));
        let scripted = self.create_script.borrow_mut().pop_front();
        scripted.unwrap_or_else(|| self.create_default.borrow().clone())
    }

    fn update(&self, profile: &ProfileDocument, uri: &str) -> Result<ProfileDocument, RemoteError> {
        self.record(Call::Update(profile.clone(), uri.to_string()));
        Ok(self.write_result.borrow().clone())
    }

    fn patch(
        &self,
        uri: &str,
        operation: &str,
        path: &str,
        value: &Value,
    ) -> Result<ProfileDocument, RemoteError> {
        self.record(Call::Patch {
            uri: uri.to_string(),
            operation: operation.to_string(),
            path: path.to_string(),
            value: value.clone(),
        });
        Ok(self.write_result.borrow().clone())
    }

    fn delete(&self, profile: &ProfileDocument) -> Result<(), RemoteError> {
        self.record(Call::Delete(profile.clone()));
        Ok(())
    }

    fn set_power_state(&self, hardware_uri: &str, request: PowerRequest) -> Result<(), RemoteError> {
        self.record(Call::SetPowerState(hardware_uri.to_string(), request));
        Ok(())
    }

    fn compliance_preview(&self, profile_uri: &str) -> Result<Value, RemoteError> {
        self.record(Call::CompliancePreview(profile_uri.to_string()));
        Ok(self.preview.borrow().clone())
    }
}
