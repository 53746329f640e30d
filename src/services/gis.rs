//! PEA GIS (ArcGIS MapServer) customer lookup
//!
//! Meters are looked up by PEA number on the low-voltage meter layer; when
//! that yields nothing the customer account (CA) is tried instead.

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;

use crate::config::GIS_TIMEOUT;
use crate::entities::meters;
use crate::models::gis::{
    CustomerDetails, EsriFeature, EsriPointGeometry, GisMatch, PeaMeterDetailAttributes,
    PeaMeterDetailsResponse,
};

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
/// WGS 84
const OUT_SPATIAL_REFERENCE: &str = "4326";
const PEA_NO_FIELD: &str = "PEA.DS_LowVoltageMeter.PEANO";
const CA_FIELD: &str = "PEA.METER_DETAIL.CA";

const OUT_FIELDS: &str = "PEA.DS_LowVoltageMeter.SUBTYPECODE,PEA.DS_LowVoltageMeter.PHASEDESIGNATION,\
PEA.METER_DETAIL.CODE,PEA.METER_DETAIL.PREFIX,PEA.METER_DETAIL.CUSTOMERNAME,\
PEA.METER_DETAIL.CUSTOMERSIRNAME,PEA.METER_DETAIL.ADDRESSNO,PEA.METER_DETAIL.ROOMNO,\
PEA.METER_DETAIL.FLOORNO,PEA.METER_DETAIL.MOO,PEA.METER_DETAIL.STREET,PEA.METER_DETAIL.TUMBOL,\
PEA.METER_DETAIL.AMPHOE,PEA.METER_DETAIL.CHANGWAT,PEA.METER_DETAIL.POSTCODE,\
PEA.METER_DETAIL.VILLAGEBUILDING,PEA.METER_DETAIL.TROK,PEA.METER_DETAIL.SOI,\
PEA.METER_DETAIL.METERTYPE,PEA.METER_DETAIL.CA,PEA.METER_DETAIL.KWATTHOURS,\
PEA.METER_DETAIL.CURRDATE,PEA.METER_DETAIL.MATERIALNUMBER";

lazy_static! {
    static ref LAT_LNG: Regex =
        Regex::new(r"^\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*$").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub enum GisError {
    /// Non-success status or transport failure
    Unavailable(String),
    Timeout,
    /// Neither the PEA number nor the CA matched a feature
    NotFound,
    /// Record has nothing to look up by
    MissingIdentifier,
}

impl std::fmt::Display for GisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GisError::Unavailable(msg) => write!(f, "cannot get data from gis: {}", msg),
            GisError::Timeout => write!(f, "cannot get data from gis: request timed out"),
            GisError::NotFound => write!(f, "No GIS record matches this meter"),
            GisError::MissingIdentifier => write!(f, "Meter has no PEA number or CA to look up"),
        }
    }
}

impl std::error::Error for GisError {}

impl From<reqwest::Error> for GisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GisError::Timeout
        } else {
            GisError::Unavailable(err.to_string())
        }
    }
}

#[derive(Clone)]
pub struct GisService {
    client: Client,
    query_url: String,
    root_url: String,
}

impl GisService {
    pub fn new(query_url: String, root_url: String) -> Self {
        let client = Client::builder()
            .timeout(GIS_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            query_url,
            root_url,
        }
    }

    /// Run one attribute query against the meter detail layer
    pub async fn query(&self, field: &str, value: &str) -> Result<PeaMeterDetailsResponse, GisError> {
        let where_clause = equals_clause(field, value);
        tracing::debug!(where_clause = %where_clause, "Querying GIS");

        let response = self
            .client
            .post(&self.query_url)
            .form(&[
                ("where", where_clause.as_str()),
                ("outFields", OUT_FIELDS),
                ("f", "json"),
                ("outSR", OUT_SPATIAL_REFERENCE),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(status = %status, "GIS query returned non-success status");
            return Err(GisError::Unavailable(format!("status {}", status)));
        }

        Ok(response.json().await?)
    }

    /// First feature for the PEA number, falling back to the CA
    pub async fn lookup_customer(
        &self,
        pea_no: Option<&str>,
        ca: Option<&str>,
    ) -> Result<(GisMatch, EsriFeature), GisError> {
        let pea_no = pea_no.map(str::trim).filter(|s| !s.is_empty());
        let ca = ca.map(str::trim).filter(|s| !s.is_empty());
        if pea_no.is_none() && ca.is_none() {
            return Err(GisError::MissingIdentifier);
        }

        if let Some(pea_no) = pea_no {
            let response = self.query(PEA_NO_FIELD, pea_no).await?;
            if let Some(feature) = response.features.into_iter().next() {
                return Ok((GisMatch::PeaNo, feature));
            }
            tracing::info!(pea_no = %pea_no, "No GIS feature for PEA number, trying CA");
        }

        if let Some(ca) = ca {
            let response = self.query(CA_FIELD, ca).await?;
            if let Some(feature) = response.features.into_iter().next() {
                return Ok((GisMatch::Ca, feature));
            }
        }

        Err(GisError::NotFound)
    }

    /// Customer details for a meter record, with distance to the recorded location
    pub async fn customer_details(&self, meter: &meters::Model) -> Result<CustomerDetails, GisError> {
        // The old meter is the one registered in GIS until the replacement syncs
        let pea_no = meter
            .pea_no_old
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(meter.pea_no_new.as_str());
        let (matched_by, feature) = self.lookup_customer(Some(pea_no), meter.ca.as_deref()).await?;
        Ok(customer_details(matched_by, feature, meter.installation_location.as_deref()))
    }

    pub async fn check_connection(&self) -> Result<(), GisError> {
        let response = self.client.get(&self.root_url).send().await?;
        if !response.status().is_success() {
            return Err(GisError::Unavailable(format!("status {}", response.status())));
        }
        Ok(())
    }
}

/// `field='value'` with single quotes doubled
pub fn equals_clause(field: &str, value: &str) -> String {
    format!("{}='{}'", field, value.replace('\'', "''"))
}

/// Parse a "lat,lng" location string
pub fn parse_location(raw: &str) -> Option<(f64, f64)> {
    let caps = LAT_LNG.captures(raw)?;
    let lat: f64 = caps[1].parse().ok()?;
    let lng: f64 = caps[2].parse().ok()?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return None;
    }
    Some((lat, lng))
}

/// Great-circle distance in metres between two (lat, lng) points
pub fn haversine_meters(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lng1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lng2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

fn join_present(parts: &[(Option<&str>, &str)]) -> String {
    parts
        .iter()
        .filter_map(|(value, prefix)| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty() && *v != "-")
                .map(|v| format!("{}{}", prefix, v))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn customer_name(attrs: &PeaMeterDetailAttributes) -> String {
    let title_and_name = format!(
        "{}{}",
        attrs.prefix.as_deref().unwrap_or("").trim(),
        attrs.customer_name.as_deref().unwrap_or("").trim()
    );
    join_present(&[
        (Some(title_and_name.as_str()), ""),
        (attrs.customer_surname.as_deref(), ""),
    ])
}

pub fn address(attrs: &PeaMeterDetailAttributes) -> String {
    join_present(&[
        (attrs.address_no.as_deref(), ""),
        (attrs.village_building.as_deref(), ""),
        (attrs.floor_no.as_deref(), "ชั้น "),
        (attrs.room_no.as_deref(), "ห้อง "),
        (attrs.moo.as_deref(), "หมู่ "),
        (attrs.trok.as_deref(), "ตรอก"),
        (attrs.soi.as_deref(), "ซ."),
        (attrs.street.as_deref(), "ถ."),
        (attrs.tumbol.as_deref(), "ต."),
        (attrs.amphoe.as_deref(), "อ."),
        (attrs.changwat.as_deref(), "จ."),
        (attrs.postcode.as_deref(), ""),
    ])
}

pub fn customer_details(
    matched_by: GisMatch,
    feature: EsriFeature,
    installation_location: Option<&str>,
) -> CustomerDetails {
    let attrs = &feature.attributes;
    let distance_meters = match (installation_location.and_then(parse_location), feature.geometry) {
        (Some(recorded), Some(EsriPointGeometry { x, y })) => Some(haversine_meters(recorded, (y, x))),
        _ => None,
    };

    CustomerDetails {
        matched_by,
        customer_name: customer_name(attrs),
        address: address(attrs),
        ca: attrs.ca.clone(),
        meter_type: attrs.meter_type.clone(),
        phase_designation: attrs.phase_designation,
        kwatt_hours: attrs.kwatt_hours,
        location: feature.geometry,
        distance_meters,
    }
}
