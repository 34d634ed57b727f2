//! Endpoints
//!
//! An [`Endpoint`] is one REST collection such as `dcim/devices`. It turns
//! filters into paginated requests and wraps results into [`Record`]s built
//! with the model resolved for the collection.

use crate::client::NautobotClient;
use crate::error::{NautobotError, Result};
use crate::models::{self, DetailSpec, Model, RECORD};
use crate::query::Request;
use crate::response::Record;
use reqwest::Url;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

/// Filter names that collide with pagination and lookup parameters
pub const RESERVED_KWARGS: &[&str] = &["pk", "limit", "offset"];

/// Allowed values per field, as returned by [`Endpoint::choices`]
pub type Choices = BTreeMap<String, Vec<Value>>;

/// Query filters; a key may repeat to match any of several values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    params: Vec<(String, String)>,
}

impl Filters {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Free-text search (`q=`)
    pub fn search(query: impl Into<String>) -> Self {
        Self::new().add("q", query.into())
    }

    /// Add a value; repeating a key sends it several times
    pub fn add(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Add one entry per value under the same key
    pub fn add_all<I, V>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        for value in values {
            self.params.push((key.to_string(), value.to_string()));
        }
        self
    }

    /// Whether `key` is present
    pub fn contains(&self, key: &str) -> bool {
        self.params.iter().any(|(k, _)| k == key)
    }

    /// No filters set
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Query parameters in insertion order
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    fn check_reserved(&self) -> Result<()> {
        match self.params.iter().find(|(k, _)| RESERVED_KWARGS.contains(&k.as_str())) {
            Some((key, _)) => Err(NautobotError::Validation(format!(
                "A reserved {key:?} filter was passed; \
                 {RESERVED_KWARGS:?} cannot be used as filters"
            ))),
            None => Ok(()),
        }
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Filters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
        }
    }
}

/// Pagination and version overrides for list calls
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Page size, 0 for the server maximum
    pub limit: Option<u64>,
    /// Start of the single page to return
    pub offset: Option<u64>,
    /// API version for this call only
    pub api_version: Option<String>,
}

impl ListOptions {
    /// Defaults: every page, client API version
    pub fn new() -> Self {
        Self::default()
    }

    /// Page size; 0 asks the server for its maximum
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Return only the page starting here (requires a positive limit)
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// API version for this call only
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }
}

/// Element of a bulk update or delete
#[derive(Debug, Clone, Copy)]
pub enum BulkItem<'a> {
    /// Object UUID
    Id(&'a str),
    /// JSON object carrying an `id` plus the fields to change
    Object(&'a Value),
    Record(&'a Record),
}

impl BulkItem<'_> {
    fn kind(&self) -> &'static str {
        match self {
            BulkItem::Id(_) => "id",
            BulkItem::Object(value) => json_kind(value),
            BulkItem::Record(_) => "record",
        }
    }
}

impl<'a> From<&'a str> for BulkItem<'a> {
    fn from(id: &'a str) -> Self {
        BulkItem::Id(id)
    }
}

impl<'a> From<&'a String> for BulkItem<'a> {
    fn from(id: &'a String) -> Self {
        BulkItem::Id(id)
    }
}

impl<'a> From<&'a Value> for BulkItem<'a> {
    fn from(value: &'a Value) -> Self {
        BulkItem::Object(value)
    }
}

impl<'a> From<&'a Record> for BulkItem<'a> {
    fn from(record: &'a Record) -> Self {
        BulkItem::Record(record)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn invalid_type(item: &BulkItem<'_>) -> NautobotError {
    NautobotError::Validation(format!("Invalid object type: {}", item.kind()))
}

/// Validation error for a record without an id
pub(crate) fn missing_id(record: &Record) -> NautobotError {
    NautobotError::Validation(format!("'{}' object has no attribute 'id'", record.model().name))
}

/// `(app, endpoint)` addressed by an absolute API URL, if it is one
///
/// Plugin URLs keep the plugin in the app part (`plugins/<plugin>`).
pub fn split_api_path(base_url: &str, url: &str) -> Option<(String, String)> {
    let base = Url::parse(base_url).ok()?;
    let target = Url::parse(url).ok()?;
    let rest = target.path().strip_prefix(base.path().trim_end_matches('/'))?;
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        ["plugins", plugin, name @ .., _id] if !name.is_empty() => {
            Some((format!("plugins/{plugin}"), name.join("/")))
        }
        ["plugins", ..] => None,
        [app, name, ..] => Some((app.to_string(), name.to_string())),
        _ => None,
    }
}

/// One REST collection
#[derive(Debug, Clone)]
pub struct Endpoint {
    client: NautobotClient,
    app: String,
    name: String,
    url: String,
    model: &'static Model,
    choices: Arc<OnceCell<Choices>>,
}

impl Endpoint {
    /// Endpoint `name` of `app`; underscores in `name` become dashes
    pub fn new(client: NautobotClient, app: &str, name: &str) -> Self {
        let name = name.replace('_', "-");
        let url = format!("{}/{}/{}", client.base_url(), app, name);
        let model = models::lookup(app, &name);
        Self {
            client,
            app: app.to_string(),
            name,
            url,
            model,
            choices: Arc::new(OnceCell::new()),
        }
    }

    /// Endpoint owning the object at `url`
    pub fn from_url(client: &NautobotClient, url: &str) -> Option<Self> {
        let (app, name) = split_api_path(client.base_url(), url)?;
        Some(Self::new(client.clone(), &app, &name))
    }

    /// Client this endpoint talks through
    pub fn client(&self) -> &NautobotClient {
        &self.client
    }

    /// Owning app, e.g. `dcim`
    pub fn app(&self) -> &str {
        &self.app
    }

    /// Collection name, e.g. `devices`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection URL without trailing slash
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Model used to build records
    pub fn model(&self) -> &'static Model {
        self.model
    }

    fn request(&self, api_version: Option<&str>) -> Request {
        self.client
            .request(&self.url)
            .api_version(api_version.map(str::to_string))
    }

    /// Caller filters preceded by client defaults the caller did not override
    fn with_defaults(&self, filters: &Filters) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = self
            .client
            .default_filters()
            .iter()
            .filter(|(key, _)| !filters.contains(key))
            .cloned()
            .collect();
        params.extend(filters.params().iter().cloned());
        params
    }

    fn load(&self, response: Value) -> Result<Vec<Record>> {
        match response {
            Value::Array(items) => items
                .into_iter()
                .map(|item| Record::from_value(item, self, self.model))
                .collect(),
            other => Ok(vec![Record::from_value(other, self, self.model)?]),
        }
    }

    /// Every object of the collection
    pub async fn all(&self) -> Result<Vec<Record>> {
        self.list(&Filters::new(), &ListOptions::default()).await
    }

    /// Like [`Endpoint::all`] with paging options
    pub async fn all_with(&self, options: &ListOptions) -> Result<Vec<Record>> {
        self.list(&Filters::new(), options).await
    }

    /// Objects matching `filters`; empty filters behave like [`Endpoint::all`]
    pub async fn filter(&self, filters: &Filters) -> Result<Vec<Record>> {
        self.filter_with(filters, &ListOptions::default()).await
    }

    /// Like [`Endpoint::filter`] with paging options
    pub async fn filter_with(
        &self,
        filters: &Filters,
        options: &ListOptions,
    ) -> Result<Vec<Record>> {
        if filters.is_empty() {
            return Err(NautobotError::Validation(
                "filter must be passed filters. Perhaps use all() instead.".to_string(),
            ));
        }
        filters.check_reserved()?;
        self.list(filters, options).await
    }

    async fn list(&self, filters: &Filters, options: &ListOptions) -> Result<Vec<Record>> {
        let response = self
            .request(options.api_version.as_deref())
            .filters(self.with_defaults(filters))
            .limit(options.limit)
            .offset(options.offset)
            .get()
            .await?;
        self.load(response)
    }

    /// Object by id, `None` when the server answers 404
    ///
    /// Client default filters ride along as query parameters.
    pub async fn get(&self, key: impl fmt::Display) -> Result<Option<Record>> {
        let request = self
            .request(None)
            .key(key)
            .filters(self.with_defaults(&Filters::new()))
            .threading(false);
        let response = match request.get().await {
            Ok(response) => response,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        Record::expanded(response, self, self.model).map(Some)
    }

    /// The single object matching `filters`
    ///
    /// `None` when nothing matches; more than one match is a validation error.
    pub async fn get_by(&self, filters: &Filters) -> Result<Option<Record>> {
        let mut matches = self.filter(filters).await?;
        if matches.len() > 1 {
            return Err(NautobotError::Validation(
                "get() returned more than one result. Check that the filters passed are valid \
                 for this endpoint or use filter() or all() instead."
                    .to_string(),
            ));
        }
        Ok(matches.pop())
    }

    /// Create one object
    pub async fn create(&self, data: &Value) -> Result<Record> {
        let response = self.request(None).post(data).await?;
        Record::from_value(response, self, self.model)
    }

    /// Create several objects in one request
    pub async fn create_many(&self, data: &[Value]) -> Result<Vec<Record>> {
        let response = self.request(None).post(&Value::Array(data.to_vec())).await?;
        self.load(response)
    }

    /// PATCH one object without fetching it first
    pub async fn update_by_id(&self, id: impl fmt::Display, data: &Value) -> Result<bool> {
        self.request(None).key(id).patch(data).await?;
        Ok(true)
    }

    /// Bulk PATCH
    ///
    /// Records contribute `{id, ..changes}` and are skipped when unchanged;
    /// JSON objects are sent as given and must carry an `id`. Every element
    /// is checked before anything is sent. Nothing to send means no request
    /// and an empty result.
    pub async fn update(&self, items: &[BulkItem<'_>]) -> Result<Vec<Record>> {
        let mut payload = Vec::with_capacity(items.len());
        for item in items {
            match item {
                BulkItem::Record(record) => {
                    let id = record.id().ok_or_else(|| missing_id(record))?;
                    let updates = record.updates();
                    if updates.is_empty() {
                        continue;
                    }
                    let mut entry = Map::new();
                    entry.insert("id".to_string(), id.clone());
                    entry.extend(updates);
                    payload.push(Value::Object(entry));
                }
                BulkItem::Object(value @ Value::Object(map)) => {
                    if map.get("id").is_none_or(Value::is_null) {
                        return Err(NautobotError::Validation(
                            "'object' has no attribute 'id'".to_string(),
                        ));
                    }
                    payload.push(Value::clone(value));
                }
                other => return Err(invalid_type(other)),
            }
        }

        if payload.is_empty() {
            debug!("Bulk update of {} has no changes to send", self.url);
            return Ok(Vec::new());
        }
        debug!("Bulk update of {} objects at {}", payload.len(), self.url);
        let response = self.request(None).patch(&Value::Array(payload)).await?;
        self.load(response)
    }

    /// Bulk DELETE of UUIDs or records, validated before anything is sent
    pub async fn delete(&self, items: &[BulkItem<'_>]) -> Result<bool> {
        let mut payload = Vec::with_capacity(items.len());
        for item in items {
            let id = match item {
                BulkItem::Id(id) => {
                    Uuid::parse_str(id).map_err(|err| {
                        NautobotError::Validation(format!("{id:?} is not a valid UUID: {err}"))
                    })?;
                    Value::from(*id)
                }
                BulkItem::Record(record) => record.id().cloned().ok_or_else(|| missing_id(record))?,
                other => return Err(invalid_type(other)),
            };
            payload.push(json!({ "id": id }));
        }

        if payload.is_empty() {
            return Ok(false);
        }
        debug!("Bulk delete of {} objects at {}", payload.len(), self.url);
        self.request(None).delete(Some(&Value::Array(payload))).await
    }

    /// Number of objects matching `filters`
    pub async fn count(&self, filters: &Filters) -> Result<u64> {
        filters.check_reserved()?;
        self.request(None)
            .filters(self.with_defaults(filters))
            .get_count()
            .await
    }

    /// Allowed values for choice fields, read from an OPTIONS request
    ///
    /// Fetched once per endpoint handle (clones share the cache).
    pub async fn choices(&self) -> Result<Choices> {
        self.choices
            .get_or_try_init(|| self.fetch_choices())
            .await
            .cloned()
    }

    async fn fetch_choices(&self) -> Result<Choices> {
        let response = self.request(None).options().await?;
        parse_choices(&response).ok_or_else(|| {
            NautobotError::Validation(format!(
                "Unexpected format in the OPTIONS response at {}",
                self.url
            ))
        })
    }
}

/// Choices from `actions.POST.*.choices`, or from `schema.properties.*.enum`
/// paired with `enumNames`
fn parse_choices(response: &Value) -> Option<Choices> {
    if let Some(post) = response.pointer("/actions/POST").and_then(Value::as_object) {
        return Some(
            post.iter()
                .filter_map(|(field, spec)| {
                    let choices = spec.get("choices")?.as_array()?;
                    Some((field.clone(), choices.clone()))
                })
                .collect(),
        );
    }

    let properties = response.pointer("/schema/properties")?.as_object()?;
    Some(
        properties
            .iter()
            .filter_map(|(field, spec)| {
                let values = spec.get("enum")?.as_array()?;
                let names = spec.get("enumNames").and_then(Value::as_array);
                let entries: Vec<Value> = values
                    .iter()
                    .enumerate()
                    .map(|(i, value)| {
                        let display = names.and_then(|n| n.get(i)).unwrap_or(value);
                        json!({ "value": value, "display": display })
                    })
                    .collect();
                Some((field.clone(), entries))
            })
            .collect(),
    )
}

/// Sub-resource `<collection>/<id>/<name>/` of one record
#[derive(Debug, Clone)]
pub struct DetailEndpoint {
    parent: Endpoint,
    url: String,
    read_only: bool,
    model: &'static Model,
}

impl DetailEndpoint {
    pub(crate) fn new(parent: Endpoint, key: &str, spec: &DetailSpec) -> Self {
        let url = format!("{}/{}/{}/", parent.url(), key, spec.name);
        Self {
            parent,
            url,
            read_only: spec.read_only,
            model: spec.returns.unwrap_or(&RECORD),
        }
    }

    /// Detail URL with trailing slash
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether writes are refused
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn request(&self) -> Request {
        self.parent.client().request(&self.url).threading(false)
    }

    fn load(&self, response: Value) -> Result<Vec<Record>> {
        match response {
            Value::Array(items) => items
                .into_iter()
                .map(|item| Record::from_value(item, &self.parent, self.model))
                .collect(),
            other => Ok(vec![Record::from_value(other, &self.parent, self.model)?]),
        }
    }

    /// GET the sub-resource as records; `params` become query parameters
    pub async fn list(&self, params: &Filters) -> Result<Vec<Record>> {
        let response = self.list_raw(params).await?;
        self.load(response)
    }

    /// GET the sub-resource as plain JSON
    pub async fn list_raw(&self, params: &Filters) -> Result<Value> {
        self.request().get_with(params.params().to_vec()).await
    }

    /// POST to the sub-resource
    ///
    /// Read-only sub-resources refuse without sending anything. A 204 answer
    /// (nothing left to allocate) is an [`NautobotError::Allocation`].
    pub async fn create(&self, data: &Value) -> Result<Vec<Record>> {
        let response = self.create_raw(data).await?;
        self.load(response)
    }

    /// POST `data` and return the raw JSON
    pub async fn create_raw(&self, data: &Value) -> Result<Value> {
        if self.read_only {
            return Err(NautobotError::Validation(
                "Writes are not supported for this endpoint.".to_string(),
            ));
        }
        self.request().post(data).await
    }
}

/// Job to run, addressed the way the server's API version expects
#[derive(Debug, Clone, Copy)]
pub enum JobRef<'a> {
    /// Job UUID (API 1.3 and newer)
    Id(&'a str),
    /// Job class path such as `local/data_quality/VerifyHostnames` (API 1.2 and older)
    ClassPath(&'a str),
}

/// `extras/jobs` with the `run` action
#[derive(Debug, Clone)]
pub struct JobsEndpoint {
    endpoint: Endpoint,
}

/// Parse `major.minor` out of an API version string
fn parse_api_version(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().map_or(Some(0), |m| m.parse().ok())?;
    Some((major, minor))
}

impl JobsEndpoint {
    /// Wrap the `extras/jobs` endpoint
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// The underlying collection, for listing and filtering jobs
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Run a job with `data` as its input
    ///
    /// The API version comes from the client, or from the server when the
    /// client has none.
    pub async fn run(&self, job: JobRef<'_>, data: &Value) -> Result<Record> {
        let (version, parsed) = self.api_version().await?;
        self.run_with_version(job, version, parsed, data).await
    }

    /// Run the job whose record key is `key`
    ///
    /// The key is sent as the job id, or as the class path on API 1.2 and older.
    pub(crate) async fn run_key(&self, key: &str, data: &Value) -> Result<Record> {
        let (version, parsed) = self.api_version().await?;
        let job = if parsed < (1, 3) {
            JobRef::ClassPath(key)
        } else {
            JobRef::Id(key)
        };
        self.run_with_version(job, version, parsed, data).await
    }

    async fn api_version(&self) -> Result<(String, (u32, u32))> {
        let client = self.endpoint.client();
        let version = match client.api_version() {
            Some(version) => version.to_string(),
            None => client.version().await?,
        };
        let parsed = parse_api_version(&version).ok_or_else(|| {
            NautobotError::Validation(format!("Cannot determine the API version from {version:?}"))
        })?;
        Ok((version, parsed))
    }

    async fn run_with_version(
        &self,
        job: JobRef<'_>,
        version: String,
        parsed: (u32, u32),
        data: &Value,
    ) -> Result<Record> {
        let target = match (job, parsed < (1, 3)) {
            (JobRef::ClassPath(path), true) if !path.is_empty() => path,
            (JobRef::Id(id), false) if !id.is_empty() => id,
            (_, true) => {
                return Err(NautobotError::Validation(
                    "A job class path is required to run a job in Nautobot APIv1.2 and older."
                        .to_string(),
                ));
            }
            (_, false) => {
                return Err(NautobotError::Validation(
                    "A job id is required to run a job in Nautobot APIv1.3 and newer.".to_string(),
                ));
            }
        };

        let url = format!("{}/{}/run/", self.endpoint.url(), target);
        debug!("Running job {} (API {})", target, version);
        let response = self
            .endpoint
            .client()
            .request(&url)
            .api_version(Some(version))
            .post(data)
            .await?;
        Record::from_value(response, &self.endpoint, self.endpoint.model())
    }
}
