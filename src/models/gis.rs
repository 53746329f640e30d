//! ArcGIS query response types and the customer details derived from them

use serde::{Deserialize, Serialize};

/// Point geometry in the requested spatial reference (x = longitude, y = latitude)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EsriPointGeometry {
    pub x: f64,
    pub y: f64,
}

/// Attributes of a low-voltage meter feature joined with its customer detail
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeaMeterDetailAttributes {
    #[serde(rename = "PEA.DS_LowVoltageMeter.SUBTYPECODE")]
    pub subtype_code: Option<i64>,
    #[serde(rename = "PEA.DS_LowVoltageMeter.PHASEDESIGNATION")]
    pub phase_designation: Option<i64>,
    #[serde(rename = "PEA.METER_DETAIL.CODE")]
    pub code: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.PREFIX")]
    pub prefix: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.CUSTOMERNAME")]
    pub customer_name: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.CUSTOMERSIRNAME")]
    pub customer_surname: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.ADDRESSNO")]
    pub address_no: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.ROOMNO")]
    pub room_no: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.FLOORNO")]
    pub floor_no: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.MOO")]
    pub moo: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.STREET")]
    pub street: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.TUMBOL")]
    pub tumbol: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.AMPHOE")]
    pub amphoe: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.CHANGWAT")]
    pub changwat: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.POSTCODE")]
    pub postcode: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.VILLAGEBUILDING")]
    pub village_building: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.TROK")]
    pub trok: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.SOI")]
    pub soi: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.METERTYPE")]
    pub meter_type: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.CA")]
    pub ca: Option<String>,
    #[serde(rename = "PEA.METER_DETAIL.KWATTHOURS")]
    pub kwatt_hours: Option<f64>,
    /// Epoch milliseconds
    #[serde(rename = "PEA.METER_DETAIL.CURRDATE")]
    pub curr_date: Option<i64>,
    #[serde(rename = "PEA.METER_DETAIL.MATERIALNUMBER")]
    pub material_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EsriFeature {
    pub attributes: PeaMeterDetailAttributes,
    pub geometry: Option<EsriPointGeometry>,
}

/// Root of the ArcGIS `query` response; only the parts we read
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeaMeterDetailsResponse {
    #[serde(default)]
    pub display_field_name: Option<String>,
    #[serde(default)]
    pub features: Vec<EsriFeature>,
}

/// How the GIS record was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GisMatch {
    PeaNo,
    Ca,
}

/// Customer and location details returned by GET /api/meters/{id}/gis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    pub matched_by: GisMatch,
    pub customer_name: String,
    pub address: String,
    pub ca: Option<String>,
    pub meter_type: Option<String>,
    pub phase_designation: Option<i64>,
    pub kwatt_hours: Option<f64>,
    pub location: Option<EsriPointGeometry>,
    /// Great-circle distance between the recorded installation point and the GIS point
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatusResponse {
    pub service: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
