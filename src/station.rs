//! Normalized BART departure records and their OMF type.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::IngressError;
use crate::omf::{OmfType, PropertyDefinition, PropertyType, TypeDefinition};
use crate::parser::RawEstimate;

/// Prefix of every stream id this ingress creates.
pub const STREAM_PREFIX: &str = "BART";

/// Records of one poll keyed by stream id. Every value is non-empty.
pub type FetchBatch = BTreeMap<String, Vec<StationEtd>>;

/// `BART_<origin>_<destination>`, the identity of one stream.
pub fn stream_id(origin_abbr: &str, destination_abbr: &str) -> String {
    format!("{STREAM_PREFIX}_{origin_abbr}_{destination_abbr}")
}

/// The nearest departure from one origin towards one destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationEtd {
    #[serde(skip)]
    stream_id: String,
    #[serde(rename = "TimeStamp")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "Minutes")]
    minutes: i32,
    #[serde(rename = "Platform")]
    platform: i32,
    #[serde(rename = "Direction")]
    direction: String,
    #[serde(rename = "Length")]
    length: i32,
    #[serde(rename = "Color")]
    color: String,
    #[serde(rename = "HexColor")]
    hex_color: String,
    #[serde(rename = "BikeFlag")]
    bike_flag: bool,
    #[serde(rename = "Delay")]
    delay: i32,
    #[serde(rename = "Destination")]
    destination: String,
}

static STATION_ETD_TYPE: Lazy<TypeDefinition> = Lazy::new(|| {
    TypeDefinition::dynamic(
        "BartStationEtd",
        &[
            (
                "TimeStamp",
                PropertyDefinition::new(PropertyType::String)
                    .with_format("date-time")
                    .index(),
            ),
            ("Minutes", PropertyDefinition::new(PropertyType::Integer).with_format("int32")),
            ("Platform", PropertyDefinition::new(PropertyType::Integer).with_format("int32")),
            ("Direction", PropertyDefinition::new(PropertyType::String)),
            ("Length", PropertyDefinition::new(PropertyType::Integer).with_format("int32")),
            ("Color", PropertyDefinition::new(PropertyType::String)),
            ("HexColor", PropertyDefinition::new(PropertyType::String)),
            ("BikeFlag", PropertyDefinition::new(PropertyType::Boolean)),
            ("Delay", PropertyDefinition::new(PropertyType::Integer).with_format("int32")),
            ("Destination", PropertyDefinition::new(PropertyType::String)),
        ],
    )
});

impl OmfType for StationEtd {
    fn type_definition() -> &'static TypeDefinition {
        &STATION_ETD_TYPE
    }
}

impl StationEtd {
    /// Builds the record for one raw estimate observed at `timestamp`.
    ///
    /// # Errors
    ///
    /// [`IngressError::Parse`] if a numeric field is not a number.
    pub fn from_estimate(
        origin_abbr: &str,
        destination_abbr: &str,
        destination: &str,
        estimate: &RawEstimate,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, IngressError> {
        let minutes = if estimate.minutes.eq_ignore_ascii_case("leaving") {
            0
        } else {
            parse_int("minutes", &estimate.minutes)?
        };

        Ok(Self {
            stream_id: stream_id(origin_abbr, destination_abbr),
            timestamp,
            minutes,
            platform: parse_int("platform", &estimate.platform)?,
            direction: estimate.direction.clone(),
            length: parse_int("length", &estimate.length)?,
            color: estimate.color.clone(),
            hex_color: estimate.hexcolor.clone(),
            bike_flag: estimate.bikeflag.trim() == "1",
            delay: parse_int("delay", &estimate.delay)?,
            destination: destination.to_string(),
        })
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn minutes(&self) -> i32 {
        self.minutes
    }

    pub fn platform(&self) -> i32 {
        self.platform
    }

    pub fn direction(&self) -> &str {
        &self.direction
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }
}

/// Empty numeric fields read as zero; BART leaves `delay` and `length` blank
/// on some estimates.
fn parse_int(field: &str, value: &str) -> Result<i32, IngressError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse()
        .map_err(|_| IngressError::Parse(format!("field '{field}' is not an integer: '{value}'")))
}
