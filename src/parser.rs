//! JSON parser for BART real-time ETD responses.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::IngressError;
use crate::station::{FetchBatch, StationEtd, stream_id};

/// Destination filter value that keeps every destination.
pub const ALL: &str = "all";

#[derive(Debug, Deserialize)]
struct EtdResponse {
    root: EtdRoot,
}

#[derive(Debug, Deserialize)]
struct EtdRoot {
    date: String,
    time: String,
    station: Vec<OriginStation>,
}

#[derive(Debug, Deserialize)]
struct OriginStation {
    abbr: String,
    /// Absent when no trains are scheduled from this station.
    #[serde(default)]
    etd: Vec<DestinationEtd>,
}

#[derive(Debug, Deserialize)]
struct DestinationEtd {
    #[serde(default)]
    destination: String,
    abbreviation: String,
    #[serde(default)]
    estimate: Vec<RawEstimate>,
}

/// One departure estimate exactly as the BART API reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEstimate {
    pub minutes: String,
    pub platform: String,
    pub direction: String,
    #[serde(default)]
    pub length: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub hexcolor: String,
    #[serde(default)]
    pub bikeflag: String,
    #[serde(default)]
    pub delay: String,
}

/// Decodes an ETD response into a batch keyed by stream id.
///
/// Only the nearest estimate per destination is kept. `dest_filter` is either
/// [`ALL`] or a destination abbreviation, both compared case-insensitively.
///
/// # Errors
///
/// Returns [`IngressError::Parse`] if the document is not valid JSON, lacks a
/// required field, carries a timezone other than `PST`/`PDT`, or lists the
/// same origin and destination twice.
pub fn parse_etd(bytes: &[u8], dest_filter: &str) -> Result<FetchBatch, IngressError> {
    let response: EtdResponse = serde_json::from_slice(bytes)?;
    let root = response.root;
    let timestamp = parse_timestamp(&root.date, &root.time)?;
    let keep_all = dest_filter.eq_ignore_ascii_case(ALL);

    let mut batch = FetchBatch::new();
    for origin in &root.station {
        for destination in &origin.etd {
            if !keep_all && !dest_filter.eq_ignore_ascii_case(&destination.abbreviation) {
                continue;
            }

            let Some(nearest) = destination.estimate.first() else {
                debug!(
                    origin = %origin.abbr,
                    destination = %destination.abbreviation,
                    "No estimate for destination, skipping"
                );
                continue;
            };

            let id = stream_id(&origin.abbr, &destination.abbreviation);
            if batch.contains_key(&id) {
                return Err(IngressError::Parse(format!(
                    "stream '{id}' appears more than once in the response"
                )));
            }

            let record = StationEtd::from_estimate(
                &origin.abbr,
                &destination.abbreviation,
                &destination.destination,
                nearest,
                timestamp,
            )?;
            batch.insert(id, vec![record]);
        }
    }

    Ok(batch)
}

/// Combines BART's `date` (`MM/dd/yyyy`) and `time` (`hh:mm:ss AM PDT`) into
/// a UTC instant.
///
/// # Errors
///
/// [`IngressError::Parse`] if either part is malformed or the zone is not
/// `PST` (UTC-8) or `PDT` (UTC-7).
pub fn parse_timestamp(date: &str, time: &str) -> Result<DateTime<Utc>, IngressError> {
    let time = time.trim();
    let (clock, zone) = time
        .rsplit_once(' ')
        .ok_or_else(|| IngressError::Parse(format!("time '{time}' has no timezone")))?;

    let offset_hours = match zone.to_ascii_uppercase().as_str() {
        "PST" => 8,
        "PDT" => 7,
        other => {
            return Err(IngressError::Parse(format!(
                "unsupported timezone abbreviation '{other}'"
            )));
        }
    };
    let offset = FixedOffset::west_opt(offset_hours * 3600)
        .ok_or_else(|| IngressError::Parse(format!("invalid offset for '{zone}'")))?;

    let local = NaiveDateTime::parse_from_str(
        &format!("{} {}", date.trim(), clock.trim()),
        "%m/%d/%Y %I:%M:%S %p",
    )
    .map_err(|e| IngressError::Parse(format!("invalid date/time '{date} {time}': {e}")))?;

    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| IngressError::Parse(format!("ambiguous local time '{date} {time}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const SAMPLE: &str = r##"{
        "?xml": {"@version": "1.0", "@encoding": "utf-8"},
        "root": {
            "@id": "1",
            "uri": {"#cdata-section": "http://api.bart.gov/api/etd.aspx?cmd=etd&orig=12TH&json=y"},
            "date": "10/16/2026",
            "time": "09:15:00 AM PDT",
            "station": [
                {
                    "name": "12th St. Oakland City Center",
                    "abbr": "12TH",
                    "etd": [
                        {
                            "destination": "Pittsburg/Bay Point",
                            "abbreviation": "PITT",
                            "limited": "0",
                            "estimate": [
                                {"minutes": "5", "platform": "2", "direction": "North", "length": "10",
                                 "color": "YELLOW", "hexcolor": "#ffff33", "bikeflag": "1", "delay": "0"},
                                {"minutes": "20", "platform": "2", "direction": "North", "length": "10",
                                 "color": "YELLOW", "hexcolor": "#ffff33", "bikeflag": "1", "delay": "0"}
                            ]
                        },
                        {
                            "destination": "Richmond",
                            "abbreviation": "RICH",
                            "limited": "0",
                            "estimate": [
                                {"minutes": "Leaving", "platform": "1", "direction": "North", "length": "6",
                                 "color": "ORANGE", "hexcolor": "#ff9933", "bikeflag": "1", "delay": "0"}
                            ]
                        }
                    ]
                },
                {
                    "name": "19th St. Oakland",
                    "abbr": "19TH",
                    "etd": [
                        {
                            "destination": "Richmond",
                            "abbreviation": "RICH",
                            "limited": "0",
                            "estimate": [
                                {"minutes": "3", "platform": "1", "direction": "North", "length": "6",
                                 "color": "ORANGE", "hexcolor": "#ff9933", "bikeflag": "0", "delay": "120"}
                            ]
                        }
                    ]
                },
                {
                    "name": "Ashby",
                    "abbr": "ASHB"
                }
            ],
            "message": ""
        }
    }"##;

    fn keys(batch: &FetchBatch) -> Vec<&str> {
        batch.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_parse_all_destinations() {
        let batch = parse_etd(SAMPLE.as_bytes(), "all").unwrap();

        assert_eq!(
            keys(&batch),
            vec!["BART_12TH_PITT", "BART_12TH_RICH", "BART_19TH_RICH"]
        );
        let pitt = &batch["BART_12TH_PITT"];
        assert_eq!(pitt.len(), 1);
        assert_eq!(pitt[0].minutes(), 5);
        assert_eq!(batch["BART_12TH_RICH"][0].minutes(), 0);
    }

    #[test]
    fn test_all_filter_is_case_insensitive() {
        let batch = parse_etd(SAMPLE.as_bytes(), "ALL").unwrap();
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_destination_filter() {
        let batch = parse_etd(SAMPLE.as_bytes(), "rich").unwrap();

        assert_eq!(keys(&batch), vec!["BART_12TH_RICH", "BART_19TH_RICH"]);
        assert!(batch.values().flatten().all(|r| r.stream_id().ends_with("_RICH")));
    }

    #[test]
    fn test_unknown_destination_yields_empty_batch() {
        let batch = parse_etd(SAMPLE.as_bytes(), "DUBL").unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_records_share_root_timestamp() {
        let batch = parse_etd(SAMPLE.as_bytes(), "all").unwrap();
        let expected = Utc.with_ymd_and_hms(2026, 10, 16, 16, 15, 0).unwrap();
        assert!(batch.values().flatten().all(|r| r.timestamp() == expected));
    }

    #[test]
    fn test_missing_station_is_parse_error() {
        let json = r#"{"root": {"date": "10/16/2026", "time": "09:15:00 AM PDT"}}"#;
        assert!(matches!(parse_etd(json.as_bytes(), "all"), Err(IngressError::Parse(_))));
    }

    #[test]
    fn test_repeated_destination_is_parse_error() {
        let json = r#"{"root": {"date": "10/16/2026", "time": "09:15:00 AM PDT", "station": [
            {"abbr": "12TH", "etd": [
                {"destination": "Richmond", "abbreviation": "RICH",
                 "estimate": [{"minutes": "3", "platform": "1", "direction": "North"}]},
                {"destination": "Richmond", "abbreviation": "RICH",
                 "estimate": [{"minutes": "8", "platform": "1", "direction": "North"}]}
            ]}
        ]}}"#;

        let err = parse_etd(json.as_bytes(), "all").unwrap_err();

        assert!(matches!(&err, IngressError::Parse(msg) if msg.contains("BART_12TH_RICH")));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        assert!(matches!(parse_etd(b"<html>", "all"), Err(IngressError::Parse(_))));
    }

    #[test]
    fn test_pst_and_pdt_offsets() {
        let local = Utc.with_ymd_and_hms(2026, 1, 5, 8, 30, 0).unwrap();

        let pst = parse_timestamp("01/05/2026", "08:30:00 AM PST").unwrap();
        let pdt = parse_timestamp("01/05/2026", "08:30:00 AM PDT").unwrap();

        assert_eq!(pst - local, Duration::hours(8));
        assert_eq!(pdt - local, Duration::hours(7));
    }

    #[test]
    fn test_timezone_is_case_insensitive() {
        assert!(parse_timestamp("01/05/2026", "08:30:00 AM pst").is_ok());
    }

    #[test]
    fn test_unsupported_timezone() {
        for zone in ["EST", "UTC", "PT", "-07:00"] {
            let result = parse_timestamp("01/05/2026", &format!("08:30:00 AM {zone}"));
            assert!(matches!(result, Err(IngressError::Parse(_))), "{zone} should fail");
        }
    }

    #[test]
    fn test_missing_timezone() {
        assert!(matches!(
            parse_timestamp("01/05/2026", "08:30:00"),
            Err(IngressError::Parse(_))
        ));
    }

    #[test]
    fn test_late_pdt_rolls_over_to_next_utc_day() {
        let ts = parse_timestamp("10/16/2026", "11:59:00 PM PDT").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 10, 17, 6, 59, 0).unwrap());
    }
}
