//! Device report parsing.
//!
//! A report is a JSON object. Its `URC` array holds the status codes as
//! strings, and one object element whose `DL` field echoes the last downlink
//! the device processed. Everything else in the report is telemetry.

use serde_json::Value;

use crate::error::{Error, Result};

const URC_FIELD: &str = "URC";
const DL_FIELD: &str = "DL";

/// Result codes and echoed downlink extracted from one device report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceReport {
    urcs: Vec<String>,
    downlink: Option<String>,
}

impl DeviceReport {
    pub fn new(urcs: Vec<String>, downlink: Option<String>) -> Self {
        Self { urcs, downlink }
    }

    /// Extract codes and echoed downlink from a report body.
    ///
    /// A body without `URC` field yields an empty report.
    pub fn parse(body: &Value) -> Result<Self> {
        let object = body
            .as_object()
            .ok_or_else(|| Error::Serialization("device report is not a JSON object".to_string()))?;

        let entries = match object.get(URC_FIELD) {
            None | Some(Value::Null) => return Ok(Self::default()),
            Some(Value::Array(entries)) => entries,
            Some(_) => {
                return Err(Error::Serialization(format!(
                    "field {} of device report is not an array",
                    URC_FIELD
                )));
            }
        };

        let urcs = entries
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();

        let downlink = entries
            .iter()
            .find_map(Value::as_object)
            .and_then(|dl| dl.get(DL_FIELD))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self { urcs, downlink })
    }

    /// Status codes in report order.
    pub fn urcs(&self) -> &[String] {
        &self.urcs
    }

    /// Last downlink echoed back by the device.
    pub fn echoed_downlink(&self) -> Option<&str> {
        self.downlink.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.urcs.is_empty()
    }
}
