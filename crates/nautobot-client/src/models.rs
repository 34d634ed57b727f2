//! Record models
//!
//! A [`Model`] describes how records of one endpoint are built: which fields
//! hold opaque JSON, which nested objects get a specialised model, how the
//! record is displayed, and which detail sub-resources hang off it. Models
//! are resolved once per endpoint through [`lookup`].

/// Fields kept as raw JSON on every record
pub const JSON_FIELDS: &[&str] = &["custom_fields", "local_context_data"];

/// List fields whose scalar values are serialized without duplicates
pub const LIST_AS_SET: &[&str] = &["tags", "tagged_vlans", "nat_outside"];

/// A sub-resource addressed as `<collection>/<id>/<name>/`
#[derive(Debug)]
pub struct DetailSpec {
    /// Path segment under the object URL
    pub name: &'static str,
    /// POST is refused without touching the network
    pub read_only: bool,
    /// Model for returned records, the generic one when `None`
    pub returns: Option<&'static Model>,
}

/// How a record renders through `Display`
///
/// Every rule except `CablePair` falls back to the first truthy of
/// `display`, `name` and `label`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayRule {
    /// First truthy of `display`, `name` and `label`
    Default,
    /// This field first
    Field(&'static str),
    /// A field reached through nested records, e.g. `["circuit", "cid"]`
    Path(&'static [&'static str]),
    /// `<termination_a> <> <termination_b>`, or `Cable #<id>` when an end is missing
    CablePair,
    /// The default fields, then the id
    DefaultOrId,
}

/// Behaviour of the records of one endpoint
#[derive(Debug)]
pub struct Model {
    /// Type name used in error messages
    pub name: &'static str,
    /// Fields stored as opaque JSON instead of child records
    pub json_fields: &'static [&'static str],
    /// Specialised models for nested objects, keyed by field name
    pub nested: &'static [(&'static str, &'static Model)],
    /// How records render through `Display`
    pub display: DisplayRule,
    /// Supports the cable `trace/` sub-resource
    pub traceable: bool,
    /// Jobs run themselves through `<jobs>/<id>/run/`
    pub runnable: bool,
    /// Detail sub-resources beyond `notes`
    pub details: &'static [DetailSpec],
}

impl Model {
    const fn generic(name: &'static str) -> Self {
        Self {
            name,
            json_fields: &[],
            nested: &[],
            display: DisplayRule::Default,
            traceable: false,
            runnable: false,
            details: &[],
        }
    }

    /// Whether `field` is kept as opaque JSON
    pub fn is_json_field(&self, field: &str) -> bool {
        JSON_FIELDS.contains(&field) || self.json_fields.contains(&field)
    }

    /// Model used for a nested object stored under `field`
    pub fn nested_model(&self, field: &str) -> &'static Model {
        self.nested
            .iter()
            .find(|(name, _)| *name == field)
            .map_or(&RECORD, |(_, model)| *model)
    }

    /// Declared detail sub-resource, `notes` being available everywhere
    pub fn detail(&self, name: &str) -> Option<&DetailSpec> {
        self.details
            .iter()
            .find(|d| d.name == name)
            .or_else(|| (name == NOTES.name).then_some(&NOTES))
    }
}

static NOTES: DetailSpec = DetailSpec {
    name: "notes",
    read_only: false,
    returns: None,
};

/// Generic record
pub static RECORD: Model = Model::generic("Record");

// dcim

/// `dcim/device-types` records
pub static DEVICE_TYPES: Model = Model {
    display: DisplayRule::Field("model"),
    ..Model::generic("DeviceTypes")
};

/// `dcim/devices` records
pub static DEVICES: Model = Model {
    json_fields: &["local_context_data", "config_context"],
    nested: &[("device_type", &DEVICE_TYPES)],
    details: &[DetailSpec {
        name: "napalm",
        read_only: true,
        returns: None,
    }],
    ..Model::generic("Devices")
};

/// Far end of an interface or port
pub static CONNECTED_ENDPOINT: Model = Model {
    nested: &[("device", &DEVICES)],
    ..Model::generic("ConnectedEndpoint")
};

/// `dcim/interface-connections` records
pub static INTERFACE_CONNECTIONS: Model = Model {
    display: DisplayRule::Path(&["interface_a", "name"]),
    ..Model::generic("InterfaceConnections")
};

/// The `interface_connection` field of an interface
pub static INTERFACE_CONNECTION: Model = Model {
    display: DisplayRule::Path(&["interface", "name"]),
    ..Model::generic("InterfaceConnection")
};

/// `dcim/interfaces` records
pub static INTERFACES: Model = Model {
    nested: &[
        ("interface_connection", &INTERFACE_CONNECTION),
        ("connected_endpoint", &CONNECTED_ENDPOINT),
    ],
    traceable: true,
    ..Model::generic("Interfaces")
};

/// `dcim/power-outlets` records
pub static POWER_OUTLETS: Model = Model {
    nested: &[("device", &DEVICES)],
    traceable: true,
    ..Model::generic("PowerOutlets")
};

/// `dcim/power-ports` records
pub static POWER_PORTS: Model = Model {
    nested: &[("device", &DEVICES)],
    traceable: true,
    ..Model::generic("PowerPorts")
};

/// `dcim/console-ports` records
pub static CONSOLE_PORTS: Model = Model {
    nested: &[("device", &DEVICES)],
    traceable: true,
    ..Model::generic("ConsolePorts")
};

/// `dcim/console-server-ports` records
pub static CONSOLE_SERVER_PORTS: Model = Model {
    nested: &[("device", &DEVICES)],
    traceable: true,
    ..Model::generic("ConsoleServerPorts")
};

/// `dcim/front-ports` records
pub static FRONT_PORTS: Model = Model {
    nested: &[("device", &DEVICES)],
    ..Model::generic("FrontPorts")
};

/// `dcim/rear-ports` records
pub static REAR_PORTS: Model = Model {
    nested: &[("device", &DEVICES)],
    ..Model::generic("RearPorts")
};

/// `dcim/rack-reservations` records
pub static RACK_RESERVATIONS: Model = Model {
    display: DisplayRule::Field("description"),
    ..Model::generic("RackReservations")
};

/// `dcim/virtual-chassis` records
pub static VIRTUAL_CHASSIS: Model = Model {
    display: DisplayRule::Path(&["master", "display"]),
    ..Model::generic("VirtualChassis")
};

/// Entries of a rack `units/` listing
pub static RACK_UNITS: Model = Model {
    nested: &[("device", &DEVICES)],
    ..Model::generic("RUs")
};

/// `dcim/racks` records
pub static RACKS: Model = Model {
    details: &[
        DetailSpec {
            name: "units",
            read_only: true,
            returns: Some(&RACK_UNITS),
        },
        DetailSpec {
            name: "elevation",
            read_only: true,
            returns: Some(&RACK_UNITS),
        },
    ],
    ..Model::generic("Racks")
};

/// Either end of a cable
pub static TERMINATION: Model = Model {
    nested: &[("device", &DEVICES), ("circuit", &CIRCUITS)],
    display: DisplayRule::Field("display"),
    ..Model::generic("Termination")
};

/// `dcim/cables` records
pub static CABLES: Model = Model {
    nested: &[("termination_a", &TERMINATION), ("termination_b", &TERMINATION)],
    display: DisplayRule::CablePair,
    ..Model::generic("Cables")
};

/// `dcim/platforms` records
pub static PLATFORMS: Model = Model {
    json_fields: &["napalm_args"],
    ..Model::generic("Platforms")
};

// ipam

/// `ipam/prefixes` records
pub static PREFIXES: Model = Model {
    details: &[
        DetailSpec {
            name: "available-ips",
            read_only: false,
            returns: None,
        },
        DetailSpec {
            name: "available-prefixes",
            read_only: false,
            returns: Some(&PREFIXES),
        },
    ],
    ..Model::generic("Prefixes")
};

// circuits

/// `circuits/circuits` records
pub static CIRCUITS: Model = Model {
    display: DisplayRule::Field("cid"),
    ..Model::generic("Circuits")
};

/// `circuits/circuit-terminations` records
pub static CIRCUIT_TERMINATIONS: Model = Model {
    nested: &[("circuit", &CIRCUITS)],
    display: DisplayRule::Path(&["circuit", "cid"]),
    ..Model::generic("CircuitTerminations")
};

// virtualization

/// `virtualization/virtual-machines` records
pub static VIRTUAL_MACHINES: Model = Model {
    json_fields: &["config_context"],
    ..Model::generic("VirtualMachines")
};

// extras

/// `extras/config-contexts` records
pub static CONFIG_CONTEXTS: Model = Model {
    json_fields: &["data"],
    ..Model::generic("ConfigContexts")
};

/// `extras/object-changes` records
pub static OBJECT_CHANGES: Model = Model {
    json_fields: &["object_data"],
    display: DisplayRule::Field("request_id"),
    ..Model::generic("ObjectChanges")
};

/// `extras/custom-field-choices` records
pub static CUSTOM_FIELD_CHOICES: Model = Model {
    display: DisplayRule::Field("value"),
    ..Model::generic("CustomFieldChoices")
};

/// `extras/job-results` records
pub static JOB_RESULTS: Model = Model {
    json_fields: &["data"],
    ..Model::generic("JobResults")
};

/// `extras/jobs` records
pub static JOBS: Model = Model {
    runnable: true,
    ..Model::generic("Jobs")
};

/// `extras/dynamic-groups` records
pub static DYNAMIC_GROUPS: Model = Model {
    json_fields: &["filter"],
    display: DisplayRule::DefaultOrId,
    details: &[DetailSpec {
        name: "members",
        read_only: false,
        returns: Some(&DYNAMIC_GROUPS),
    }],
    ..Model::generic("DynamicGroups")
};

/// `extras/secrets` records
pub static SECRETS: Model = Model {
    json_fields: &["parameters"],
    ..Model::generic("Secrets")
};

// cloud

/// `cloud/cloud-resource-types` records
pub static CLOUD_RESOURCE_TYPES: Model = Model {
    json_fields: &["config_schema"],
    ..Model::generic("CloudResourceTypes")
};

/// `cloud/cloud-services` records
pub static CLOUD_SERVICES: Model = Model {
    json_fields: &["extra_config"],
    nested: &[("cloud_resource_type", &CLOUD_RESOURCE_TYPES)],
    ..Model::generic("CloudServices")
};

/// `cloud/cloud-networks` records
pub static CLOUD_NETWORKS: Model = Model {
    json_fields: &["extra_config"],
    nested: &[("cloud_resource_type", &CLOUD_RESOURCE_TYPES)],
    ..Model::generic("CloudNetworks")
};

/// Resolve the model for an endpoint (endpoint names use dashes)
pub fn lookup(app: &str, endpoint: &str) -> &'static Model {
    match (app, endpoint) {
        ("dcim", "device-types") => &DEVICE_TYPES,
        ("dcim", "devices") => &DEVICES,
        ("dcim", "interfaces") => &INTERFACES,
        ("dcim", "interface-connections") => &INTERFACE_CONNECTIONS,
        ("dcim", "virtual-chassis") => &VIRTUAL_CHASSIS,
        ("dcim", "power-outlets") => &POWER_OUTLETS,
        ("dcim", "power-ports") => &POWER_PORTS,
        ("dcim", "console-ports") => &CONSOLE_PORTS,
        ("dcim", "console-server-ports") => &CONSOLE_SERVER_PORTS,
        ("dcim", "front-ports") => &FRONT_PORTS,
        ("dcim", "rear-ports") => &REAR_PORTS,
        ("dcim", "rack-reservations") => &RACK_RESERVATIONS,
        ("dcim", "racks") => &RACKS,
        ("dcim", "cables") => &CABLES,
        ("dcim", "platforms") => &PLATFORMS,
        ("ipam", "prefixes") => &PREFIXES,
        ("circuits", "circuits") => &CIRCUITS,
        ("circuits", "circuit-terminations") => &CIRCUIT_TERMINATIONS,
        ("virtualization", "virtual-machines") => &VIRTUAL_MACHINES,
        ("extras", "config-contexts") => &CONFIG_CONTEXTS,
        ("extras", "object-changes") => &OBJECT_CHANGES,
        ("extras", "custom-field-choices") => &CUSTOM_FIELD_CHOICES,
        ("extras", "job-results") => &JOB_RESULTS,
        ("extras", "jobs") => &JOBS,
        ("extras", "dynamic-groups") => &DYNAMIC_GROUPS,
        ("extras", "secrets") => &SECRETS,
        ("cloud", "cloud-resource-types") => &CLOUD_RESOURCE_TYPES,
        ("cloud", "cloud-services") => &CLOUD_SERVICES,
        ("cloud", "cloud-networks") => &CLOUD_NETWORKS,
        _ => &RECORD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_falls_back_to_generic() {
        assert!(std::ptr::eq(lookup("dcim", "devices"), &DEVICES));
        assert!(std::ptr::eq(lookup("dcim", "sites"), &RECORD));
        assert!(std::ptr::eq(lookup("plugins/golden-config", "devices"), &RECORD));
    }

    #[test]
    fn test_json_fields() {
        assert!(DEVICES.is_json_field("config_context"));
        assert!(DEVICES.is_json_field("custom_fields"));
        assert!(RECORD.is_json_field("local_context_data"));
        assert!(!RECORD.is_json_field("config_context"));
    }

    #[test]
    fn test_nested_models() {
        assert_eq!(DEVICES.nested_model("device_type").name, "DeviceTypes");
        assert_eq!(DEVICES.nested_model("site").name, "Record");
        assert_eq!(CABLES.nested_model("termination_a").nested_model("circuit").name, "Circuits");
        assert_eq!(
            INTERFACES.nested_model("interface_connection").name,
            "InterfaceConnection"
        );
    }

    #[test]
    fn test_display_rules() {
        assert_eq!(RECORD.display, DisplayRule::Default);
        assert_eq!(CABLES.display, DisplayRule::CablePair);
        assert_eq!(TERMINATION.display, DisplayRule::Field("display"));
        assert_eq!(
            lookup("dcim", "virtual-chassis").display,
            DisplayRule::Path(&["master", "display"])
        );
        assert_eq!(lookup("dcim", "interface-connections").name, "InterfaceConnections");
        assert_eq!(lookup("circuits", "circuit-terminations").name, "CircuitTerminations");
        assert!(lookup("extras", "jobs").runnable);
        assert!(!DEVICES.runnable);
    }

    #[test]
    fn test_detail_specs() {
        assert!(DEVICES.detail("napalm").unwrap().read_only);
        assert!(RECORD.detail("notes").is_some());
        assert!(RECORD.detail("available-ips").is_none());
        assert_eq!(
            PREFIXES.detail("available-prefixes").unwrap().returns.unwrap().name,
            "Prefixes"
        );
    }
}
