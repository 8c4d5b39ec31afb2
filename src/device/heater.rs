//! Jandy JXi gas heater.
//!
//! The heater speaks three opcodes on top of the probe pair. A control
//! ping carries the desired mode and setpoints; the heater answers with
//! its status and error flags. A measurements poll returns gas-valve
//! runtime, ignition cycle count, the fault history and the water
//! temperature. The work scheduler alternates the two requests.

use tracing::{debug, error, info};

use super::{Device, DeviceError};

/// Factory-configured bus address of the JXi heater.
pub const JXI_HEATER_ADDR: u8 = 0x68;

const OP_CONTROL: u8 = 0x0c;
const OP_CONTROL_REPLY: u8 = 0x0d;
const OP_MEASUREMENTS: u8 = 0x25;

// Control request flag bits.
const CTL_POOL: u8 = 0x01;
const CTL_SPA: u8 = 0x02;
const CTL_CELSIUS: u8 = 0x04;
const CTL_HEATER_ON: u8 = 0x08;

// Status and error flag bits in the control reply.
const STATUS_LIT: u8 = 0x08;
const STATUS_REMOTE_DISABLED: u8 = 0x10;
const ERROR_IGNITION: u8 = 0x08;

/// External-temperature field value meaning "no reading".
const EXT_TEMP_NONE: u8 = 0xff;

/// Water temperature is reported with a fixed offset.
const TEMP_OFFSET: i16 = 20;

/// JXi heater device state.
///
/// Holds the control word sent to the heater and the last state reported
/// back by it.
pub struct JxiHeater {
    control: u8,
    setpoint_pool: u8,
    setpoint_spa: u8,
    poll_measurements: bool,

    water_temp: Option<i16>,
    gv_on_time: u16,
    ignition_cycles: u16,
    last_fault: u8,
    prev_fault: u8,
    lit: bool,
    remote_disabled: bool,
}

impl JxiHeater {
    /// Create a heater with Celsius scale and conservative setpoints.
    pub fn new() -> Self {
        Self {
            control: CTL_CELSIUS,
            setpoint_pool: 20,
            setpoint_spa: 35,
            poll_measurements: true,
            water_temp: None,
            gv_on_time: 0,
            ignition_cycles: 0,
            last_fault: 0,
            prev_fault: 0,
            lit: false,
            remote_disabled: false,
        }
    }

    /// Set the pool and spa temperature setpoints, in the active scale.
    pub fn set_setpoints(&mut self, pool: u8, spa: u8) {
        self.setpoint_pool = pool;
        self.setpoint_spa = spa;
    }

    /// Request heating of the pool circuit.
    pub fn heat_pool(&mut self) {
        self.control = (self.control & !CTL_SPA) | CTL_POOL | CTL_HEATER_ON;
    }

    /// Request heating of the spa circuit.
    pub fn heat_spa(&mut self) {
        self.control = (self.control & !CTL_POOL) | CTL_SPA | CTL_HEATER_ON;
    }

    /// Stop requesting heat.
    pub fn heat_off(&mut self) {
        self.control &= !CTL_HEATER_ON;
    }

    /// Last reported water temperature in the active scale, if any.
    pub fn water_temp(&self) -> Option<i16> {
        self.water_temp
    }

    /// Gas valve on-time counter from the last measurements reply.
    pub fn gv_on_time(&self) -> u16 {
        self.gv_on_time
    }

    /// Ignition cycle counter from the last measurements reply.
    pub fn ignition_cycles(&self) -> u16 {
        self.ignition_cycles
    }

    /// Most recent and previous fault codes.
    pub fn faults(&self) -> (u8, u8) {
        (self.last_fault, self.prev_fault)
    }

    /// Whether the burner is lit or igniting.
    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// Whether RS-485 remote control is disabled at the heater's panel.
    pub fn remote_disabled(&self) -> bool {
        self.remote_disabled
    }

    fn handle_control_reply(&mut self, reply: &[u8]) -> Result<(), DeviceError> {
        if reply.len() < 5 {
            return Err(DeviceError::ShortReply {
                got: reply.len(),
                need: 5,
            });
        }

        let status = reply[2];
        let errors = reply[4];
        info!(
            "heater status flags {:#04x}, error flags {:#04x}",
            status, errors
        );

        self.lit = status & STATUS_LIT != 0;
        self.remote_disabled = status & STATUS_REMOTE_DISABLED != 0;
        if self.lit {
            info!("heater is lit or igniting");
        }
        if self.remote_disabled {
            info!("remote RS-485 control is disabled at the panel");
        }
        if errors & ERROR_IGNITION != 0 {
            error!("heater reported an ignition failure");
        }

        Ok(())
    }

    fn handle_measurements(&mut self, reply: &[u8]) -> Result<(), DeviceError> {
        if reply.len() < 9 {
            return Err(DeviceError::ShortReply {
                got: reply.len(),
                need: 9,
            });
        }

        self.gv_on_time = u16::from_le_bytes([reply[2], reply[3]]);
        self.ignition_cycles = u16::from_le_bytes([reply[4], reply[5]]);
        self.last_fault = reply[6];
        self.prev_fault = reply[7];
        self.water_temp = Some(i16::from(reply[8]) - TEMP_OFFSET);

        debug!(
            "heater measurements: gv_on_time={} cycles={} water_temp={}",
            self.gv_on_time,
            self.ignition_cycles,
            self.water_temp.unwrap_or_default()
        );

        Ok(())
    }
}

impl Default for JxiHeater {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for JxiHeater {
    fn name(&self) -> &'static str {
        "jxi-heater"
    }

    fn handle_reply(&mut self, reply: &[u8]) -> Result<(), DeviceError> {
        match reply[1] {
            OP_CONTROL_REPLY => self.handle_control_reply(reply),
            OP_MEASUREMENTS => self.handle_measurements(reply),
            other => Err(DeviceError::UnknownOpcode(other)),
        }
    }

    fn next_request(&mut self, buf: &mut [u8]) -> Option<usize> {
        self.poll_measurements = !self.poll_measurements;

        if !self.poll_measurements {
            buf[1] = OP_MEASUREMENTS;
            Some(2)
        } else {
            buf[1] = OP_CONTROL;
            buf[2] = self.control;
            buf[3] = self.setpoint_pool;
            buf[4] = self.setpoint_spa;
            buf[5] = EXT_TEMP_NONE;
            Some(6)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurements_reply_updates_state() {
        let mut heater = JxiHeater::new();
        let reply = [0x00, 0x25, 0x12, 0x00, 0x3b, 0x01, 0x00, 0x00, 0x20];
        heater.handle_reply(&reply).unwrap();

        assert_eq!(heater.gv_on_time(), 0x0012);
        assert_eq!(heater.ignition_cycles(), 0x013b);
        assert_eq!(heater.faults(), (0x00, 0x00));
        assert_eq!(heater.water_temp(), Some(0x20 - TEMP_OFFSET));
    }

    #[test]
    fn test_control_reply_updates_flags() {
        let mut heater = JxiHeater::new();

        heater
            .handle_reply(&[0x00, 0x0d, STATUS_LIT, 0x00, 0x00])
            .unwrap();
        assert!(heater.is_lit());
        assert!(!heater.remote_disabled());

        heater
            .handle_reply(&[0x00, 0x0d, STATUS_REMOTE_DISABLED, 0x00, ERROR_IGNITION])
            .unwrap();
        assert!(!heater.is_lit());
        assert!(heater.remote_disabled());
    }

    #[test]
    fn test_short_replies_are_rejected() {
        let mut heater = JxiHeater::new();

        assert_eq!(
            heater.handle_reply(&[0x00, 0x0d, 0x08]),
            Err(DeviceError::ShortReply { got: 3, need: 5 })
        );
        assert_eq!(
            heater.handle_reply(&[0x00, 0x25, 0x12, 0x00]),
            Err(DeviceError::ShortReply { got: 4, need: 9 })
        );
    }

    #[test]
    fn test_unknown_opcode_is_rejected() {
        let mut heater = JxiHeater::new();
        assert_eq!(
            heater.handle_reply(&[0x00, 0x7e, 0x00]),
            Err(DeviceError::UnknownOpcode(0x7e))
        );
    }

    #[test]
    fn test_requests_alternate_poll_and_ping() {
        let mut heater = JxiHeater::new();
        heater.set_setpoints(25, 38);
        heater.heat_spa();
        let mut buf = [0u8; 16];

        let len = heater.next_request(&mut buf).unwrap();
        assert_eq!(&buf[1..len], [OP_MEASUREMENTS]);

        let len = heater.next_request(&mut buf).unwrap();
        assert_eq!(
            &buf[1..len],
            [
                OP_CONTROL,
                CTL_CELSIUS | CTL_SPA | CTL_HEATER_ON,
                25,
                38,
                EXT_TEMP_NONE
            ]
        );

        let len = heater.next_request(&mut buf).unwrap();
        assert_eq!(&buf[1..len], [OP_MEASUREMENTS]);
    }

    #[test]
    fn test_heat_mode_switching() {
        let mut heater = JxiHeater::new();

        heater.heat_pool();
        let mut buf = [0u8; 16];
        let _ = heater.next_request(&mut buf); // measurements
        let _ = heater.next_request(&mut buf); // control ping
        assert_eq!(buf[2], CTL_CELSIUS | CTL_POOL | CTL_HEATER_ON);

        heater.heat_off();
        let _ = heater.next_request(&mut buf);
        let _ = heater.next_request(&mut buf);
        assert_eq!(buf[2], CTL_CELSIUS | CTL_POOL);
    }
}
