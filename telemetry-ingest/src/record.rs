use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::codec::{FieldSpec, SchemaDescriptor};
use crate::store::LatestPolicy;

/// The entity kinds published by the sensor network, one topic each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Bin,
    House,
    Street,
    Suburb,
    Driveway,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Bin,
        EntityKind::House,
        EntityKind::Street,
        EntityKind::Suburb,
        EntityKind::Driveway,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Bin => "bin",
            EntityKind::House => "house",
            EntityKind::Street => "street",
            EntityKind::Suburb => "suburb",
            EntityKind::Driveway => "driveway",
        }
    }

    /// Plural form, used for HTTP routes and default topic names.
    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Bin => "bins",
            EntityKind::House => "houses",
            EntityKind::Street => "streets",
            EntityKind::Suburb => "suburbs",
            EntityKind::Driveway => "driveways",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded, immutable telemetry message.
///
/// Implementors deserialize from the canonical field names of their [`SchemaDescriptor`];
/// the codec takes care of aliases and casing before serde sees the payload.
pub trait Record:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    const KIND: EntityKind;

    /// How "latest" is decided for this kind when queried by key.
    const LATEST_POLICY: LatestPolicy;

    fn schema() -> &'static SchemaDescriptor;

    /// The identity key. Not unique across a store: later messages are appended.
    fn key(&self) -> &str;

    fn timestamp(&self) -> Option<OffsetDateTime> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// A free-form list of ids. Publishers send either a JSON array or a comma separated
/// string; both end up as a list of trimmed, non-empty ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IdList(Vec<String>);

impl IdList {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<String> for IdList {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        IdList(
            iter.into_iter()
                .map(|id| id.trim().to_owned())
                .filter(|id| !id.is_empty())
                .collect(),
        )
    }
}

impl<'de> Deserialize<'de> for IdList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            List(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text.split(',').map(str::to_owned).collect(),
            Raw::List(ids) => ids.into_iter().collect(),
        })
    }
}

static LOCATION_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    name: "location",
    fields: &[
        FieldSpec::required("latitude").aliases(&["lat"]),
        FieldSpec::required("longitude").aliases(&["lon", "lng"]),
    ],
};

static ASSOCIATED_HOUSE_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    name: "house",
    fields: &[
        FieldSpec::required("property_id").aliases(&["PropertyId", "house_id"]),
        FieldSpec::required("address"),
        FieldSpec::required("location")
            .aliases(&["house_location", "HouseLocation"])
            .nested(&LOCATION_SCHEMA),
    ],
};

static BIN_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    name: "bin",
    fields: &[
        FieldSpec::required("bin_id").aliases(&["BinId"]),
        FieldSpec::optional("timestamp"),
        FieldSpec::required("location").nested(&LOCATION_SCHEMA),
        FieldSpec::optional("fill_level_percentage").aliases(&["FillLevelPercentage"]),
        FieldSpec::required("status"),
        FieldSpec::optional("temperature_celsius").aliases(&["TemperatureCelsius"]),
        FieldSpec::required("house")
            .aliases(&["associated_house", "AssociatedHouse"])
            .nested(&ASSOCIATED_HOUSE_SCHEMA),
    ],
};

static HOUSE_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    name: "house",
    fields: &[
        FieldSpec::required("property_id").aliases(&["PropertyId"]),
        FieldSpec::required("address"),
        FieldSpec::required("location").nested(&LOCATION_SCHEMA),
        FieldSpec::required("driveway_ids").aliases(&["DrivewayIds"]),
    ],
};

static STREET_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    name: "street",
    fields: &[
        FieldSpec::required("street_id").aliases(&["StreetId"]),
        FieldSpec::required("name"),
        FieldSpec::required("house_ids").aliases(&["HouseIds"]),
    ],
};

static SUBURB_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    name: "suburb",
    fields: &[
        FieldSpec::required("suburb_id").aliases(&["SuburbId"]),
        FieldSpec::optional("name"),
        FieldSpec::optional("street_ids").aliases(&["StreetIds"]),
    ],
};

static DRIVEWAY_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    name: "driveway",
    fields: &[
        FieldSpec::required("driveway_id").aliases(&["DrivewayId", "id"]),
        FieldSpec::required("location").nested(&LOCATION_SCHEMA),
    ],
};

/// The house a bin belongs to, embedded by value in bin messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociatedHouse {
    pub property_id: String,
    pub address: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinRecord {
    pub bin_id: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
    pub location: Location,
    pub fill_level_percentage: Option<f64>,
    pub status: String,
    pub temperature_celsius: Option<f64>,
    pub house: AssociatedHouse,
}

impl Record for BinRecord {
    const KIND: EntityKind = EntityKind::Bin;
    const LATEST_POLICY: LatestPolicy = LatestPolicy::ByFieldTimestampDescending;

    fn schema() -> &'static SchemaDescriptor {
        &BIN_SCHEMA
    }

    fn key(&self) -> &str {
        &self.bin_id
    }

    fn timestamp(&self) -> Option<OffsetDateTime> {
        self.timestamp
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseRecord {
    pub property_id: String,
    pub address: String,
    pub location: Location,
    pub driveway_ids: IdList,
}

impl Record for HouseRecord {
    const KIND: EntityKind = EntityKind::House;
    const LATEST_POLICY: LatestPolicy = LatestPolicy::ByInsertionOrderLast;

    fn schema() -> &'static SchemaDescriptor {
        &HOUSE_SCHEMA
    }

    fn key(&self) -> &str {
        &self.property_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreetRecord {
    pub street_id: String,
    pub name: String,
    pub house_ids: IdList,
}

impl Record for StreetRecord {
    const KIND: EntityKind = EntityKind::Street;
    const LATEST_POLICY: LatestPolicy = LatestPolicy::ByInsertionOrderLast;

    fn schema() -> &'static SchemaDescriptor {
        &STREET_SCHEMA
    }

    fn key(&self) -> &str {
        &self.street_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuburbRecord {
    pub suburb_id: String,
    pub name: Option<String>,
    pub street_ids: Option<IdList>,
}

impl Record for SuburbRecord {
    const KIND: EntityKind = EntityKind::Suburb;
    const LATEST_POLICY: LatestPolicy = LatestPolicy::ByInsertionOrderLast;

    fn schema() -> &'static SchemaDescriptor {
        &SUBURB_SCHEMA
    }

    fn key(&self) -> &str {
        &self.suburb_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrivewayRecord {
    pub driveway_id: String,
    pub location: Location,
}

impl Record for DrivewayRecord {
    const KIND: EntityKind = EntityKind::Driveway;
    const LATEST_POLICY: LatestPolicy = LatestPolicy::ByInsertionOrderLast;

    fn schema() -> &'static SchemaDescriptor {
        &DRIVEWAY_SCHEMA
    }

    fn key(&self) -> &str {
        &self.driveway_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_list_from_text_and_array() {
        let from_text: IdList = serde_json::from_str(r#"" a, b ,,c ""#).unwrap();
        let from_array: IdList = serde_json::from_str(r#"["a", " b", "", "c"]"#).unwrap();

        assert_eq!(from_text.as_slice(), ["a", "b", "c"]);
        assert_eq!(from_text, from_array);
        assert_eq!(serde_json::to_string(&from_text).unwrap(), r#"["a","b","c"]"#);
    }

    #[test]
    fn test_only_bins_use_timestamps() {
        assert_eq!(
            BinRecord::LATEST_POLICY,
            LatestPolicy::ByFieldTimestampDescending
        );
        assert_eq!(HouseRecord::LATEST_POLICY, LatestPolicy::ByInsertionOrderLast);
        assert_eq!(StreetRecord::LATEST_POLICY, LatestPolicy::ByInsertionOrderLast);
        assert_eq!(SuburbRecord::LATEST_POLICY, LatestPolicy::ByInsertionOrderLast);
        assert_eq!(
            DrivewayRecord::LATEST_POLICY,
            LatestPolicy::ByInsertionOrderLast
        );
    }

    #[test]
    fn test_every_schema_requires_its_identity_key() {
        let keys = [
            (BinRecord::schema(), "bin_id"),
            (HouseRecord::schema(), "property_id"),
            (StreetRecord::schema(), "street_id"),
            (SuburbRecord::schema(), "suburb_id"),
            (DrivewayRecord::schema(), "driveway_id"),
        ];

        for (schema, key) in keys {
            let field = schema
                .fields
                .iter()
                .find(|field| field.name == key)
                .unwrap_or_else(|| panic!("{} has no {} field", schema.name, key));
            assert!(field.required, "{} must require {}", schema.name, key);
        }
    }
}
