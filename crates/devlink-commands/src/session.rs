//! One request/response cycle of a device.

use devlink_core::error::Result;
use devlink_core::report::DeviceReport;
use tracing::{debug, error};

use crate::downlink::DownlinkComposer;
use crate::gate::SessionGate;
use crate::urc::UrcInterpreter;

/// Interprets a device report and answers with the next downlink, one device
/// at a time.
#[derive(Clone)]
pub struct DeviceSessionService {
    gate: SessionGate,
    interpreter: UrcInterpreter,
    composer: DownlinkComposer,
}

impl DeviceSessionService {
    pub fn new(gate: SessionGate, interpreter: UrcInterpreter, composer: DownlinkComposer) -> Self {
        Self {
            gate,
            interpreter,
            composer,
        }
    }

    /// Handle one report and return the downlink to send back.
    ///
    /// State changes made before a failure are kept.
    pub async fn handle_report(&self, device_id: &str, report: &DeviceReport) -> Result<String> {
        let _guard = self.gate.acquire(device_id).await;
        debug!(category = "session", device_id = %device_id, "Processing report");

        let result = async {
            self.interpreter.interpret(device_id, report).await?;
            self.composer.compose(device_id).await
        }
        .await;

        if let Err(e) = &result {
            error!(
                category = "session",
                device_id = %device_id,
                error = %e,
                "Failed to interpret report or create downlink"
            );
        }
        result
    }
}
