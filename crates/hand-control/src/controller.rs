//! The operation set shared by every hand transport.
//!
//! Implementors supply a handful of register primitives; everything a caller uses day to day
//! (open/close, joint vectors, feedback, probes) is provided on top of them so both transports
//! share one validation path.

use crate::{HandError, Result};
use hand_protocol::{
    Generation, JointFeedback, JointVector, RegisterCategory, RegisterLayout, RegisterMap,
    RegisterName, TactileFrame, TactileMatrix, TactileSite, JOINT_COUNT, JOINT_MAX, JOINT_MIN,
};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

/// Registers read by [`HandController::validate_registers`].
pub const PROBE_REGISTERS: [RegisterName; 8] = [
    RegisterName::HandId,
    RegisterName::AngleAct,
    RegisterName::PosAct,
    RegisterName::ForceAct,
    RegisterName::Current,
    RegisterName::Error,
    RegisterName::Status,
    RegisterName::Temp,
];

pub trait HandController {
    fn generation(&self) -> Generation;

    /// Human-readable connection target ("/dev/ttyUSB0@115200", "192.168.11.210:6000").
    fn endpoint(&self) -> String;

    /// Open the configured transport, replacing any session already held.
    fn connect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Release the transport. Safe to call when already disconnected.
    fn disconnect(&mut self) -> Result<()>;

    /// Whether `-1` ("leave unchanged") may be sent to this device.
    fn accepts_unchanged(&self) -> bool;

    fn write_scalar(&mut self, name: RegisterName, value: u16) -> Result<()>;

    fn write_joints(&mut self, name: RegisterName, values: &JointVector) -> Result<()>;

    fn read_scalar(&mut self, name: RegisterName) -> Result<u16>;

    /// Six 16-bit joint values.
    fn read_joint_words(&mut self, name: RegisterName) -> Result<JointFeedback>;

    /// Six byte-wide joint values (error, status, temperature).
    fn read_joint_bytes(&mut self, name: RegisterName) -> Result<[u8; JOINT_COUNT]>;

    fn get_tactile_frame(&mut self) -> Result<TactileFrame> {
        Err(HandError::UnsupportedCapability(
            "tactile sensing needs a Gen4 hand on Modbus-TCP",
        ))
    }

    fn get_tactile_site(&mut self, _site: TactileSite) -> Result<TactileMatrix> {
        Err(HandError::UnsupportedCapability(
            "tactile sensing needs a Gen4 hand on Modbus-TCP",
        ))
    }

    fn register_map(&self) -> RegisterMap {
        RegisterMap::for_generation(self.generation())
    }

    /// Validate a caller-supplied joint vector without touching the transport.
    fn joint_vector(&self, values: &[i32]) -> Result<JointVector> {
        let v = JointVector::try_from(values)?;
        if v.has_sentinel() && !self.accepts_unchanged() {
            return Err(HandError::Validation(format!(
                "values must lie in [{JOINT_MIN}, {JOINT_MAX}] on this transport"
            )));
        }
        Ok(v)
    }

    fn reset_error(&mut self) -> Result<()> {
        self.write_scalar(RegisterName::ClearError, 1)
    }

    fn set_angle(&mut self, values: &[i32]) -> Result<()> {
        let v = self.joint_vector(values)?;
        self.write_joints(RegisterName::AngleSet, &v)
    }

    /// Positions share the angle command register.
    fn set_pos(&mut self, values: &[i32]) -> Result<()> {
        self.set_angle(values)
    }

    fn set_speed(&mut self, values: &[i32]) -> Result<()> {
        let v = self.joint_vector(values)?;
        self.write_joints(RegisterName::SpeedSet, &v)
    }

    fn set_force(&mut self, values: &[i32]) -> Result<()> {
        let v = self.joint_vector(values)?;
        self.write_joints(RegisterName::ForceSet, &v)
    }

    fn perform_open(&mut self) -> Result<()> {
        self.set_angle(&[JOINT_MAX; JOINT_COUNT])
    }

    fn perform_close(&mut self) -> Result<()> {
        self.set_angle(&[JOINT_MIN; JOINT_COUNT])
    }

    fn return_to_zero(&mut self) -> Result<()> {
        self.set_angle(&[0; JOINT_COUNT])
    }

    fn get_angle_actual(&mut self) -> Result<JointFeedback> {
        self.read_joint_words(RegisterName::AngleAct)
    }

    fn get_angle_set(&mut self) -> Result<JointFeedback> {
        self.read_joint_words(RegisterName::AngleSet)
    }

    fn get_pos_actual(&mut self) -> Result<JointFeedback> {
        self.get_angle_actual()
    }

    fn get_pos_set(&mut self) -> Result<JointFeedback> {
        self.get_angle_set()
    }

    fn get_speed_set(&mut self) -> Result<JointFeedback> {
        self.read_joint_words(RegisterName::SpeedSet)
    }

    fn get_force_actual(&mut self) -> Result<JointFeedback> {
        self.read_joint_words(RegisterName::ForceAct)
    }

    fn get_force_set(&mut self) -> Result<JointFeedback> {
        self.read_joint_words(RegisterName::ForceSet)
    }

    fn get_current(&mut self) -> Result<JointFeedback> {
        self.read_joint_words(RegisterName::Current)
    }

    fn get_error(&mut self) -> Result<[u8; JOINT_COUNT]> {
        self.read_joint_bytes(RegisterName::Error)
    }

    fn get_temperature(&mut self) -> Result<[u8; JOINT_COUNT]> {
        self.read_joint_bytes(RegisterName::Temp)
    }

    fn get_status(&mut self) -> Result<[u8; JOINT_COUNT]> {
        self.read_joint_bytes(RegisterName::Status)
    }

    /// Select a stored action sequence. Gen3 only.
    fn set_action_sequence(&mut self, id: u8) -> Result<()> {
        self.write_scalar(RegisterName::ActionSeqIndex, u16::from(id))
    }

    /// Run the selected action sequence. Gen3 only.
    fn run_action_sequence(&mut self) -> Result<()> {
        self.write_scalar(RegisterName::ActionSeqRun, 1)
    }

    /// Try reading each of [`PROBE_REGISTERS`]; `true` means the read succeeded.
    fn validate_registers(&mut self) -> Result<BTreeMap<RegisterName, bool>> {
        if !self.is_connected() {
            return Err(HandError::NotConnected);
        }
        let map = self.register_map();
        let mut results = BTreeMap::new();
        for name in PROBE_REGISTERS {
            let readable = match map.resolve(name) {
                Err(_) => {
                    warn!(register = %name, generation = %map.generation(), "probe register not in map");
                    false
                }
                Ok(entry) => {
                    let outcome = match entry.layout {
                        RegisterLayout::JointWords => self.read_joint_words(name).map(|_| ()),
                        RegisterLayout::JointBytes => self.read_joint_bytes(name).map(|_| ()),
                        _ => self.read_scalar(name).map(|_| ()),
                    };
                    if let Err(e) = &outcome {
                        warn!(register = %name, address = entry.address, error = %e, "probe failed");
                    }
                    outcome.is_ok()
                }
            };
            results.insert(name, readable);
        }
        let ok = results.values().filter(|v| **v).count();
        info!(ok, total = results.len(), "register validation complete");
        Ok(results)
    }

    /// Probe the registers and render the full register table grouped by category.
    fn verification_report(&mut self) -> Result<String> {
        let results = self.validate_registers()?;
        let map = self.register_map();
        let passed = results.values().filter(|v| **v).count();
        let generated = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());

        let rule = "=".repeat(80);
        let mut out = String::new();
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "HAND REGISTER VERIFICATION REPORT");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Generated: {generated}");
        let _ = writeln!(out, "Generation: {}", map.generation());
        let _ = writeln!(out, "Endpoint: {}", self.endpoint());
        let _ = writeln!(out);
        let _ = writeln!(out, "Probed: {}  passed: {passed}  failed: {}", results.len(), results.len() - passed);

        let mut by_category: BTreeMap<RegisterCategory, Vec<_>> = BTreeMap::new();
        for info in map.info() {
            by_category.entry(info.category).or_default().push(info);
        }
        for (category, mut rows) in by_category {
            rows.sort_by_key(|r| r.name.as_str());
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", category.as_str().to_uppercase().replace('_', " "));
            let _ = writeln!(out, "{}", "-".repeat(40));
            for row in rows {
                let status = match results.get(&row.name) {
                    Some(true) => "PASS",
                    Some(false) => "FAIL",
                    None => "-",
                };
                let _ = writeln!(
                    out,
                    "  {:<25} | {:<6} | {:<8} | {status}",
                    row.name.as_str(),
                    row.address,
                    row.hex_address
                );
            }
        }
        let _ = writeln!(out, "{rule}");
        Ok(out)
    }
}
