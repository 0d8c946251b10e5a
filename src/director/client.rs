//! Blocking client for the Cloud Director JSON API

use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::types::*;
use super::{CloudDirector, DirectorError, DirectorResult};

pub const API_VERSION: &str = "36.3";

/// Budget for establishing the connection, TLS handshake included
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(120);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

const CT_COMPOSE: &str = "application/vnd.vmware.vcloud.composeVAppParams+json";
const CT_RECOMPOSE: &str = "application/vnd.vmware.vcloud.recomposeVAppParams+json";
const CT_NETWORK_CONFIG: &str = "application/vnd.vmware.vcloud.networkConfigSection+json";
const CT_GUEST_CUSTOMIZATION: &str = "application/vnd.vmware.vcloud.guestCustomizationSection+json";
const CT_UNDEPLOY: &str = "application/vnd.vmware.vcloud.undeployVAppParams+json";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct QueryRecord {
    href: String,
    name: String,
}

#[derive(Deserialize)]
struct QueryPage {
    #[serde(default)]
    record: Vec<QueryRecord>,
}

#[derive(Deserialize)]
struct TaskStatus {
    status: String,
    #[serde(default)]
    error: Option<ErrorBody>,
}

/// Cloud Director API client bound to one tenant org
pub struct RestClient {
    http: Client,
    api: Url,
    access_token: String,
    poll_interval: Duration,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("api", &self.api.as_str())
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Authenticate to `org` by exchanging an API token for an access token.
    ///
    /// `api_url` is the API root, e.g. `https://vcd.example.com/api`.
    pub fn connect(api_url: &Url, org: &str, api_token: &str, insecure: bool) -> DirectorResult<Self> {
        let http = Client::builder()
            .connect_timeout(HANDSHAKE_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(insecure)
            .build()?;

        let mut api = api_url.clone();
        if !api.path().ends_with('/') {
            let path = format!("{}/", api.path());
            api.set_path(&path);
        }

        let token_url = api
            .join(&format!("/oauth/tenant/{}/token", org))
            .map_err(|e| DirectorError::Decode(e.to_string()))?;

        let resp = http
            .post(token_url)
            .header(ACCEPT, "application/json")
            .form(&[("grant_type", "refresh_token"), ("refresh_token", api_token)])
            .send()?;

        let token: TokenResponse = match check(resp) {
            Ok(resp) => resp.json()?,
            Err(DirectorError::Status { status: 400, message }) => {
                return Err(DirectorError::PermissionDenied(format!(
                    "unable to authenticate to Org \"{}\": {}",
                    org, message
                )))
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(org = %org, api = %api, "Authenticated to Cloud Director");

        Ok(Self {
            http,
            api,
            access_token: token.access_token,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Interval between task status polls, at least one millisecond
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    fn send(&self, req: RequestBuilder) -> DirectorResult<Value> {
        let resp = req
            .bearer_auth(&self.access_token)
            .header(ACCEPT, format!("application/*+json;version={}", API_VERSION))
            .send()?;
        let body = check(resp)?.text()?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| DirectorError::Decode(e.to_string()))
    }

    fn get(&self, href: &str) -> DirectorResult<Value> {
        self.send(self.http.get(href))
    }

    fn post(&self, href: &str, content_type: &str, body: &Value) -> DirectorResult<Value> {
        self.send(
            self.http
                .post(href)
                .header(CONTENT_TYPE, content_type)
                .body(body.to_string()),
        )
    }

    fn put(&self, href: &str, content_type: &str, body: &Value) -> DirectorResult<Value> {
        self.send(
            self.http
                .put(href)
                .header(CONTENT_TYPE, content_type)
                .body(body.to_string()),
        )
    }

    /// Run a query-service lookup and return at most one record
    fn query_one(&self, kind: &str, name: &str, filter: &str) -> DirectorResult<Option<QueryRecord>> {
        let mut url = self
            .api
            .join("query")
            .map_err(|e| DirectorError::Decode(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("type", kind)
            .append_pair("format", "records")
            .append_pair("pageSize", "128")
            .append_pair("filter", filter);

        let page: QueryPage = serde_json::from_value(self.get(url.as_str())?)
            .map_err(|e| DirectorError::Decode(e.to_string()))?;

        let mut records = page.record;
        match records.len() {
            0 => Ok(None),
            1 => Ok(records.pop()),
            count => Err(DirectorError::Ambiguous {
                name: name.to_string(),
                count,
            }),
        }
    }

    fn require(&self, kind: &str, name: &str, filter: &str) -> DirectorResult<QueryRecord> {
        self.query_one(kind, name, filter)?
            .ok_or_else(|| DirectorError::NotFound(format!("{} {}", kind, name)))
    }
}

impl CloudDirector for RestClient {
    fn find_vapp(&self, scope: &Scope, name: &str) -> DirectorResult<Option<VAppRecord>> {
        let filter = fiql_filter(&[("name", name), ("vdcName", scope.vdc.as_str())]);
        match self.query_one("vApp", name, &filter)? {
            Some(record) => self.refresh_vapp(&record.href).map(Some),
            None => Ok(None),
        }
    }

    fn refresh_vapp(&self, href: &str) -> DirectorResult<VAppRecord> {
        vapp_from_json(&self.get(href)?)
    }

    fn create_vapp(&self, scope: &Scope, name: &str, description: &str) -> DirectorResult<VAppRecord> {
        let vdc = self.require("orgVdc", &scope.vdc, &fiql_filter(&[("name", scope.vdc.as_str())]))?;
        let body = json!({
            "name": name,
            "description": description,
            "deploy": false,
            "powerOn": false,
        });
        let created = self.post(&action(&vdc.href, "action/composeVApp"), CT_COMPOSE, &body)?;
        for task in embedded_tasks(&created) {
            self.wait_task(&task)?;
        }
        let vapp = vapp_from_json(&created)?;
        tracing::info!(vapp = %vapp.name, href = %vapp.href, "Created vApp");
        Ok(vapp)
    }

    fn attach_network(&self, scope: &Scope, vapp: &VAppRecord, network: &str) -> DirectorResult<Task> {
        let net = self.require(
            "orgVdcNetwork",
            network,
            &fiql_filter(&[("name", network), ("vdcName", scope.vdc.as_str())]),
        )?;
        let body = json!({
            "networkConfig": [{
                "networkName": net.name,
                "configuration": {
                    "parentNetwork": { "href": net.href, "name": net.name },
                    "fenceMode": "bridged",
                },
                "isDeployed": false,
            }]
        });
        let resp = self.put(&action(&vapp.href, "networkConfigSection/"), CT_NETWORK_CONFIG, &body)?;
        task_from_json(&resp, "attach network")
    }

    fn resolve_template(&self, catalog: &str, template: &str) -> DirectorResult<TemplateRef> {
        let record = self.require(
            "vAppTemplate",
            template,
            &fiql_filter(&[("name", template), ("catalogName", catalog)]),
        )?;
        let body = self.get(&record.href)?;
        let vm_href = body
            .pointer("/children/vm/0/href")
            .and_then(Value::as_str)
            .ok_or_else(|| DirectorError::Decode(format!("template {} contains no VM", template)))?;
        Ok(TemplateRef {
            href: record.href,
            name: record.name,
            vm_href: vm_href.to_string(),
        })
    }

    fn add_vm(&self, vapp: &VAppRecord, spec: &VmSpec) -> DirectorResult<Task> {
        let storage = match &spec.storage_profile {
            Some(name) => {
                let filter = fiql_filter(&[("name", name.as_str())]);
                Some(self.require("orgVdcStorageProfile", name, &filter)?)
            }
            None => None,
        };
        let mut body = recompose_body(spec);
        if let (Some(profile), Some(item)) = (storage, body.pointer_mut("/sourcedItem/0")) {
            item["storageProfile"] = json!({ "href": profile.href, "name": profile.name });
        }
        let resp = self.post(&action(&vapp.href, "action/recomposeVApp"), CT_RECOMPOSE, &body)?;
        task_from_json(&resp, "recompose vApp")
    }

    fn find_vm(&self, vapp_href: &str, name: &str) -> DirectorResult<VmRecord> {
        self.list_vms(vapp_href)?
            .into_iter()
            .find(|vm| vm.name == name)
            .ok_or_else(|| DirectorError::NotFound(format!("VM {}", name)))
    }

    fn get_vm(&self, href: &str) -> DirectorResult<VmRecord> {
        vm_from_json(&self.get(href)?)
    }

    fn set_guest_customization(&self, vm: &VmRecord, section: &GuestCustomization) -> DirectorResult<Task> {
        let body = serde_json::to_value(section).map_err(|e| DirectorError::Decode(e.to_string()))?;
        let resp = self.put(
            &action(&vm.href, "guestCustomizationSection/"),
            CT_GUEST_CUSTOMIZATION,
            &body,
        )?;
        task_from_json(&resp, "update guest customization")
    }

    fn power_on_vapp(&self, vapp: &VAppRecord) -> DirectorResult<Task> {
        let resp = self.send(self.http.post(action(&vapp.href, "power/action/powerOn")))?;
        task_from_json(&resp, "power on vApp")
    }

    fn list_vms(&self, vapp_href: &str) -> DirectorResult<Vec<VmRecord>> {
        let body = self.get(vapp_href)?;
        match body.pointer("/children/vm").and_then(Value::as_array) {
            Some(vms) => vms.iter().map(vm_from_json).collect(),
            None => Ok(Vec::new()),
        }
    }

    fn undeploy_vm(&self, href: &str) -> DirectorResult<Task> {
        let body = json!({ "undeployPowerAction": "default" });
        let resp = self.post(&action(href, "action/undeploy"), CT_UNDEPLOY, &body)?;
        task_from_json(&resp, "undeploy VM")
    }

    fn delete_vm(&self, href: &str) -> DirectorResult<Task> {
        let resp = self.send(self.http.delete(href))?;
        task_from_json(&resp, "delete VM")
    }

    fn delete_vapp(&self, href: &str) -> DirectorResult<Task> {
        let body = json!({ "undeployPowerAction": "powerOff" });
        match self.post(&action(href, "action/undeploy"), CT_UNDEPLOY, &body) {
            Ok(resp) => self.wait_task(&task_from_json(&resp, "undeploy vApp")?)?,
            // Already undeployed
            Err(e) if e.is_invalid_state() => {}
            Err(e) => return Err(e),
        }
        let resp = self.send(self.http.delete(href))?;
        task_from_json(&resp, "delete vApp")
    }

    fn wait_task(&self, task: &Task) -> DirectorResult<()> {
        loop {
            let status: TaskStatus = serde_json::from_value(self.get(&task.href)?)
                .map_err(|e| DirectorError::Decode(e.to_string()))?;
            match status.status.as_str() {
                "success" => return Ok(()),
                "error" | "aborted" | "canceled" => {
                    return Err(DirectorError::TaskFailed {
                        operation: task.operation.clone(),
                        message: status
                            .error
                            .map(|e| e.message)
                            .unwrap_or_else(|| status.status.clone()),
                    })
                }
                _ => thread::sleep(self.poll_interval),
            }
        }
    }
}

fn check(resp: Response) -> DirectorResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp
        .json::<ErrorBody>()
        .map(|b| b.message)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown error").to_string());
    Err(match status {
        StatusCode::NOT_FOUND => DirectorError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DirectorError::PermissionDenied(message),
        _ => DirectorError::Status {
            status: status.as_u16(),
            message,
        },
    })
}

fn action(href: &str, path: &str) -> String {
    format!("{}/{}", href.trim_end_matches('/'), path)
}

fn str_field<'a>(value: &'a Value, field: &str) -> DirectorResult<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| DirectorError::Decode(format!("missing field {}", field)))
}

fn find_section<'a>(value: &'a Value, section_type: &str) -> Option<&'a Value> {
    value
        .get("section")
        .and_then(Value::as_array)?
        .iter()
        .find(|s| s.get("_type").and_then(Value::as_str) == Some(section_type))
}

fn task_from_json(value: &Value, operation: &str) -> DirectorResult<Task> {
    let href = str_field(value, "href")?;
    let operation = value
        .get("operationName")
        .and_then(Value::as_str)
        .unwrap_or(operation);
    Ok(Task::new(href, operation))
}

fn embedded_tasks(value: &Value) -> Vec<Task> {
    value
        .pointer("/tasks/task")
        .and_then(Value::as_array)
        .map(|tasks| {
            tasks
                .iter()
                .filter_map(|t| task_from_json(t, "compose vApp").ok())
                .collect()
        })
        .unwrap_or_default()
}

fn vapp_from_json(value: &Value) -> DirectorResult<VAppRecord> {
    let network = find_section(value, "NetworkConfigSectionType")
        .and_then(|s| s.pointer("/networkConfig/0/networkName"))
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(VAppRecord {
        href: str_field(value, "href")?.to_string(),
        name: str_field(value, "name")?.to_string(),
        network,
    })
}

fn vm_from_json(value: &Value) -> DirectorResult<VmRecord> {
    let status = value
        .get("status")
        .and_then(Value::as_i64)
        .and_then(|code| i32::try_from(code).ok())
        .map_or("UNRECOGNIZED", status_name);

    let os_type = value
        .pointer("/vmSpecSection/osType")
        .or_else(|| find_section(value, "VmSpecSectionType").and_then(|s| s.get("osType")))
        .and_then(Value::as_str)
        .unwrap_or_default();

    let addresses = find_section(value, "NetworkConnectionSectionType")
        .and_then(|s| s.get("networkConnection"))
        .and_then(Value::as_array)
        .map(|conns| {
            conns
                .iter()
                .map(|c| c.get("ipAddress").and_then(Value::as_str).unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default();

    let guest_customization = match find_section(value, "GuestCustomizationSectionType") {
        Some(section) => serde_json::from_value(section.clone())
            .map_err(|e| DirectorError::Decode(e.to_string()))?,
        None => GuestCustomization::default(),
    };

    Ok(VmRecord {
        href: str_field(value, "href")?.to_string(),
        name: str_field(value, "name")?.to_string(),
        status: status.to_string(),
        os_type: os_type.to_string(),
        addresses,
        guest_customization,
    })
}

/// Build a query-service filter matching every `(attribute, value)` pair.
///
/// Values are percent-encoded so names containing FIQL operators or
/// separators match literally.
fn fiql_filter(terms: &[(&str, &str)]) -> String {
    terms
        .iter()
        .map(|(attribute, value)| format!("{}=={}", attribute, fiql_value(value)))
        .collect::<Vec<_>>()
        .join(";")
}

fn fiql_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ';' | ',' | '(' | ')' | '=' | '!' | '~' | '<' | '>' | '%' | '*' | '\'' | '"' | ' ' => {
                escaped.push_str(&format!("%{:02X}", c as u32));
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

fn recompose_body(spec: &VmSpec) -> Value {
    let mut network = json!(spec.network);
    network["_type"] = json!("NetworkConnectionSectionType");

    json!({
        "allEULAsAccepted": true,
        "sourcedItem": [{
            "source": { "href": spec.template.vm_href, "name": spec.name },
            "vmGeneralParams": { "name": spec.name, "needsCustomization": true },
            "instantiationParams": {
                "section": [
                    network,
                    {
                        "_type": "VmSpecSectionType",
                        "modified": true,
                        "numCpus": spec.cpu_count,
                        "memoryResourceMb": { "configured": spec.memory_mb },
                    }
                ]
            }
        }]
    })
}
