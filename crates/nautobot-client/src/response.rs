//! Records built from API responses
//!
//! A [`Record`] wraps one JSON object returned by Nautobot. Nested objects
//! become child records, opaque fields stay raw JSON, and the serialized
//! state at construction is kept as a baseline so that [`Record::save`] only
//! sends what changed.
//!
//! A record built from a nested reference is a stub: reading a field it does
//! not carry through [`Record::attr`] fetches the full object from its `url`
//! once, then answers from the merged fields.

use crate::endpoint::{DetailEndpoint, Endpoint, JobsEndpoint, missing_id, split_api_path};
use crate::error::{NautobotError, Result};
use crate::models::{self, DisplayRule, LIST_AS_SET, Model, RECORD};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use tracing::debug;

/// One field of a record
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Scalar, or a value assigned by the caller
    Value(Value),
    /// Declared opaque, never converted into records
    Json(Value),
    Record(Box<Record>),
    List(Vec<Field>),
}

impl Field {
    /// Plain JSON value of a scalar or opaque field
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Value(v) | Field::Json(v) => Some(v),
            _ => None,
        }
    }

    /// String value, if any
    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    /// Integer value, if any
    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(Value::as_i64)
    }

    /// Unsigned value, if any
    pub fn as_u64(&self) -> Option<u64> {
        self.as_value().and_then(Value::as_u64)
    }

    /// Boolean value, if any
    pub fn as_bool(&self) -> Option<bool> {
        self.as_value().and_then(Value::as_bool)
    }

    /// Nested record, if this field holds one
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Field::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Mutable nested record
    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Field::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Items, if this field holds a list
    pub fn as_list(&self) -> Option<&[Field]> {
        match self {
            Field::List(items) => Some(items),
            _ => None,
        }
    }

    /// JSON null
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Value(Value::Null) | Field::Json(Value::Null))
    }

    /// Full JSON rendering, child records expanded into objects
    pub fn to_value(&self) -> Value {
        match self {
            Field::Value(v) | Field::Json(v) => v.clone(),
            Field::Record(r) => Value::Object(r.to_json()),
            Field::List(items) => Value::Array(items.iter().map(Field::to_value).collect()),
        }
    }

    /// Form sent back to the API: child records collapse to their id
    fn to_wire(&self) -> Value {
        match self {
            Field::Value(v) | Field::Json(v) => v.clone(),
            Field::Record(r) => r.nested_return(),
            Field::List(items) => Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Field::Record(r) => r.id().cloned().unwrap_or(Value::Null),
                        other => other.to_wire(),
                    })
                    .collect(),
            ),
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::Value(value)
    }
}

impl From<Record> for Field {
    fn from(record: Record) -> Self {
        Field::Record(Box::new(record))
    }
}

impl From<Vec<Field>> for Field {
    fn from(items: Vec<Field>) -> Self {
        Field::List(items)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Value(Value::from(value))
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Value(Value::from(value))
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Field::Value(Value::from(value))
    }
}

impl From<u64> for Field {
    fn from(value: u64) -> Self {
        Field::Value(Value::from(value))
    }
}

impl From<bool> for Field {
    fn from(value: bool) -> Self {
        Field::Value(Value::from(value))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Value(Value::String(s)) | Field::Json(Value::String(s)) => f.write_str(s),
            Field::Value(Value::Null) | Field::Json(Value::Null) => Ok(()),
            Field::Value(v) | Field::Json(v) => write!(f, "{v}"),
            Field::Record(r) => write!(f, "{r}"),
            Field::List(_) => write!(f, "{}", self.to_value()),
        }
    }
}

/// Whether a record has fetched its full details yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    Stub,
    Expanded,
}

/// One API object
#[derive(Debug, Clone)]
pub struct Record {
    endpoint: Endpoint,
    model: &'static Model,
    fields: BTreeMap<String, Field>,
    /// Wire form of every field as last received from the server
    baseline: BTreeMap<String, Value>,
    state: Expansion,
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Drop repeated scalars while keeping first-seen order
fn dedupe(items: &[Value]) -> Option<Vec<Value>> {
    let all_str = items.iter().all(Value::is_string);
    let all_int = items.iter().all(|v| v.is_i64() || v.is_u64());
    if !(all_str || all_int) {
        return None;
    }
    let mut seen = HashSet::new();
    Some(
        items
            .iter()
            .filter(|v| seen.insert(v.to_string()))
            .cloned()
            .collect(),
    )
}

fn apply_list_as_set(key: &str, value: Value) -> Value {
    match value {
        Value::Array(items) if LIST_AS_SET.contains(&key) => {
            dedupe(&items).map_or(Value::Array(items), Value::Array)
        }
        other => other,
    }
}

/// Comparable form used by [`Record::diff`]; lists are flattened to text
fn comparable(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::String(
            items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => other.clone(),
    }
}

impl Record {
    /// Build a record from a JSON object returned by `endpoint`
    ///
    /// When the object carries a `url`, the record is bound to the endpoint
    /// that URL points at instead.
    pub fn new(values: Map<String, Value>, endpoint: &Endpoint, model: &'static Model) -> Self {
        let endpoint = values
            .get("url")
            .and_then(Value::as_str)
            .and_then(|url| Endpoint::from_url(endpoint.client(), url))
            .unwrap_or_else(|| endpoint.clone());

        let mut record = Self {
            endpoint,
            model,
            fields: BTreeMap::new(),
            baseline: BTreeMap::new(),
            state: Expansion::Stub,
        };
        record.parse_values(values);
        record
    }

    /// Build a record from any JSON value, which must be an object
    pub fn from_value(value: Value, endpoint: &Endpoint, model: &'static Model) -> Result<Self> {
        let values: Map<String, Value> = serde_json::from_value(value)?;
        Ok(Self::new(values, endpoint, model))
    }

    /// Record built from a full detail response
    pub(crate) fn expanded(
        value: Value,
        endpoint: &Endpoint,
        model: &'static Model,
    ) -> Result<Self> {
        let mut record = Self::from_value(value, endpoint, model)?;
        record.state = Expansion::Expanded;
        Ok(record)
    }

    fn parse_values(&mut self, values: Map<String, Value>) {
        for (key, value) in values {
            let field = match value {
                v if self.model.is_json_field(&key) => Field::Json(v),
                Value::Object(map) => {
                    let model = self.model.nested_model(&key);
                    Field::Record(Box::new(Record::new(map, &self.endpoint, model)))
                }
                Value::Array(items) => Field::List(
                    items
                        .into_iter()
                        .map(|item| match item {
                            Value::Object(map) if map.get("id").is_some_and(truthy) => {
                                Field::Record(Box::new(Record::new(map, &self.endpoint, &RECORD)))
                            }
                            other => Field::Value(other),
                        })
                        .collect(),
                ),
                other => Field::Value(other),
            };
            self.baseline.insert(key.clone(), field.to_wire());
            self.fields.insert(key, field);
        }
    }

    /// Endpoint the record was loaded from
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Model describing this record
    pub fn model(&self) -> &'static Model {
        self.model
    }

    /// Whether the full object has been fetched
    pub fn state(&self) -> Expansion {
        self.state
    }

    /// The `id` field, when set to something truthy
    pub fn id(&self) -> Option<&Value> {
        self.fields
            .get("id")
            .and_then(Field::as_value)
            .filter(|v| truthy(v))
    }

    /// The id rendered as a URL path segment
    pub fn key(&self) -> Option<String> {
        self.id().map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Key of a record that must already exist on the server
    fn existing_key(&self) -> Result<String> {
        self.key().ok_or_else(|| missing_id(self))
    }

    /// Canonical detail URL of the object, from its `url` field
    pub fn url(&self) -> Option<&str> {
        self.fields.get("url").and_then(Field::as_str)
    }

    /// Field lookup without any network access
    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.get(key)
    }

    /// Mutable field access; changes show up in the diff
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Field> {
        self.fields.get_mut(key)
    }

    /// Whether the field is loaded
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Field names in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// All fields by name
    pub fn fields(&self) -> &BTreeMap<String, Field> {
        &self.fields
    }

    /// Assign a field; the change shows up in [`Record::diff`]
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Field>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Read a field, fetching the full object first if this is a stub
    ///
    /// The fetch happens at most once per record. A field still missing
    /// afterwards, or a detail URL answering 404, is an
    /// [`NautobotError::Attribute`].
    pub async fn attr(&mut self, key: &str) -> Result<&Field> {
        if !self.fields.contains_key(key) && self.state == Expansion::Stub && self.url().is_some() {
            debug!("Field {} missing on {}, fetching full details", key, self.model.name);
            match self.full_details().await {
                Ok(_) => {}
                Err(err) if err.is_not_found() => {
                    return Err(NautobotError::Attribute(key.to_string()));
                }
                Err(err) => return Err(err),
            }
        }
        self.fields
            .get(key)
            .ok_or_else(|| NautobotError::Attribute(key.to_string()))
    }

    /// Fetch the object from its `url` and merge the result
    ///
    /// Returns `false` without a request when the record has no `url`.
    pub async fn full_details(&mut self) -> Result<bool> {
        let Some(url) = self.url().map(str::to_string) else {
            return Ok(false);
        };
        self.state = Expansion::Expanded;

        let response = self
            .endpoint
            .client()
            .request(&url)
            .threading(false)
            .get()
            .await?;
        let values: Map<String, Value> = serde_json::from_value(response)?;
        self.parse_values(values);
        Ok(true)
    }

    /// Representation used when this record is the value of another's field
    ///
    /// The id for most records, `value` for choice objects (`id`, `value`
    /// and `label` only), otherwise the display string.
    pub fn nested_return(&self) -> Value {
        if let Some(id) = self.fields.get("id") {
            let choice = self.fields.len() == 3
                && ["id", "value", "label"].iter().all(|k| self.fields.contains_key(*k));
            if choice {
                if let Some(value) = self.fields.get("value") {
                    return value.to_wire();
                }
            }
            return id.to_wire();
        }
        if let Some(value) = self.fields.get("value") {
            return value.to_wire();
        }
        Value::String(self.to_string())
    }

    /// Current state in the form the API accepts on write
    pub fn serialize(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(key, field)| (key.clone(), apply_list_as_set(key, field.to_wire())))
            .collect()
    }

    fn serialize_baseline(&self) -> Map<String, Value> {
        self.baseline
            .iter()
            .map(|(key, value)| (key.clone(), apply_list_as_set(key, value.clone())))
            .collect()
    }

    /// Names of the fields whose serialized value differs from the baseline
    pub fn diff(&self) -> BTreeSet<String> {
        let current = self.serialize();
        let initial = self.serialize_baseline();
        current
            .keys()
            .chain(initial.keys())
            .filter(|key| match (current.get(*key), initial.get(*key)) {
                (Some(now), Some(then)) => comparable(now) != comparable(then),
                _ => true,
            })
            .cloned()
            .collect()
    }

    /// Changed fields with their new serialized values
    ///
    /// Always empty for records without an id.
    pub fn updates(&self) -> Map<String, Value> {
        if self.id().is_none() {
            return Map::new();
        }
        let diff = self.diff();
        self.serialize()
            .into_iter()
            .filter(|(key, _)| diff.contains(key))
            .collect()
    }

    fn rebaseline(&mut self) {
        self.baseline = self
            .fields
            .iter()
            .map(|(key, field)| (key.clone(), field.to_wire()))
            .collect();
    }

    /// PATCH the changed fields to the server
    ///
    /// Returns `false` without a request when nothing changed or the record
    /// has no id. On success the current state becomes the new baseline.
    pub async fn save(&mut self) -> Result<bool> {
        let Some(key) = self.key() else {
            return Ok(false);
        };
        let updates = self.updates();
        if updates.is_empty() {
            return Ok(false);
        }

        debug!("Saving {} {} fields: {:?}", self.model.name, key, updates.keys());
        self.endpoint
            .client()
            .request(self.endpoint.url())
            .key(&key)
            .patch(&Value::Object(updates))
            .await?;
        self.rebaseline();
        Ok(true)
    }

    /// Assign every entry of `data` then [`Record::save`]
    pub async fn update(&mut self, data: Map<String, Value>) -> Result<bool> {
        for (key, value) in data {
            self.set(key, value);
        }
        self.save().await
    }

    /// DELETE the object
    pub async fn delete(&self) -> Result<bool> {
        let key = self.existing_key()?;
        self.endpoint
            .client()
            .request(self.endpoint.url())
            .key(key)
            .delete(None)
            .await
    }

    /// Every field as plain JSON, child records rendered as objects
    pub fn to_json(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(key, field)| (key.clone(), field.to_value()))
            .collect()
    }

    /// Detail sub-resource `<endpoint>/<id>/<name>/` declared by the model
    pub fn detail(&self, name: &str) -> Result<DetailEndpoint> {
        let spec = self.model.detail(name).ok_or_else(|| {
            NautobotError::Validation(format!(
                "{} records have no {} detail endpoint",
                self.model.name, name
            ))
        })?;
        let key = self.existing_key()?;
        Ok(DetailEndpoint::new(self.endpoint.clone(), &key, spec))
    }

    /// Notes attached to this object
    pub fn notes(&self) -> Result<DetailEndpoint> {
        self.detail("notes")
    }

    /// Free addresses of a prefix; creating on it allocates the next one
    pub fn available_ips(&self) -> Result<DetailEndpoint> {
        self.detail("available-ips")
    }

    /// Free child prefixes of a prefix
    pub fn available_prefixes(&self) -> Result<DetailEndpoint> {
        self.detail("available-prefixes")
    }

    /// Members of a dynamic group
    pub fn members(&self) -> Result<DetailEndpoint> {
        self.detail("members")
    }

    /// NAPALM getters of a device (read only)
    pub fn napalm(&self) -> Result<DetailEndpoint> {
        self.detail("napalm")
    }

    /// Rack units of a rack
    pub fn units(&self) -> Result<DetailEndpoint> {
        self.detail("units")
    }

    /// Rack elevation
    pub fn elevation(&self) -> Result<DetailEndpoint> {
        self.detail("elevation")
    }

    /// Run this job with `data` as its input
    pub async fn run(&self, data: &Value) -> Result<Record> {
        if !self.model.runnable {
            return Err(NautobotError::Validation(format!(
                "{} records cannot be run",
                self.model.name
            )));
        }
        let key = self.existing_key()?;
        JobsEndpoint::new(self.endpoint.clone()).run_key(&key, data).await
    }

    /// Follow the cable path of a port or interface
    ///
    /// Each hop is `(near end, cable, far end)`; ends are `None` where the
    /// path is not fully terminated.
    pub async fn trace(&self) -> Result<Vec<TraceHop>> {
        if !self.model.traceable {
            return Err(NautobotError::Validation(format!(
                "{} records cannot be traced",
                self.model.name
            )));
        }
        let key = self.existing_key()?;
        let response = self
            .endpoint
            .client()
            .request(self.endpoint.url())
            .key(format!("{key}/trace"))
            .threading(false)
            .get()
            .await?;

        let hops: Vec<(Value, Value, Value)> = serde_json::from_value(response)?;
        let base_url = self.endpoint.client().base_url().to_string();
        let load = |item: Value| -> Result<Option<Record>> {
            if !truthy(&item) {
                return Ok(None);
            }
            let model = item
                .get("url")
                .and_then(Value::as_str)
                .and_then(|url| split_api_path(&base_url, url))
                .map_or(&RECORD, |(app, name)| trace_model(&app, &name));
            Record::from_value(item, &self.endpoint, model).map(Some)
        };

        hops.into_iter()
            .map(|(a, cable, b)| -> Result<TraceHop> { Ok((load(a)?, load(cable)?, load(b)?)) })
            .collect()
    }
}

/// One segment of a cable trace
pub type TraceHop = (Option<Record>, Option<Record>, Option<Record>);

fn trace_model(app: &str, name: &str) -> &'static Model {
    match (app, name) {
        ("dcim", "cables" | "front-ports" | "interfaces" | "rear-ports") => {
            models::lookup(app, name)
        }
        _ => &RECORD,
    }
}

impl Record {
    /// First truthy field along `path`, walking nested records
    fn display_path(&self, path: &[&str]) -> Option<String> {
        let (last, parents) = path.split_last()?;
        let mut record = self;
        for key in parents {
            record = record.fields.get(*key)?.as_record()?;
        }
        let field = record.fields.get(*last)?;
        field
            .as_value()
            .is_none_or(truthy)
            .then(|| field.to_string())
    }

    fn default_display(&self) -> Option<String> {
        ["display", "name", "label"]
            .into_iter()
            .find_map(|key| self.display_path(&[key]))
    }

    fn display_text(&self) -> Option<String> {
        match self.model.display {
            DisplayRule::Default => self.default_display(),
            DisplayRule::Field(field) => self
                .display_path(&[field])
                .or_else(|| self.default_display()),
            DisplayRule::Path(path) => self.display_path(path).or_else(|| self.default_display()),
            DisplayRule::CablePair => {
                let end = |key: &str| self.fields.get(key).and_then(Field::as_record);
                match (end("termination_a"), end("termination_b")) {
                    (Some(a), Some(b)) => Some(format!("{a} <> {b}")),
                    _ => Some(format!("Cable #{}", self.key().unwrap_or_default())),
                }
            }
            DisplayRule::DefaultOrId => self.default_display().or_else(|| self.key()),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.display_text() {
            Some(text) => f.write_str(&text),
            None => Ok(()),
        }
    }
}

/// Records are equal when they come from the same endpoint with the same id
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.endpoint.name() == other.endpoint.name() && self.id() == other.id()
    }
}
