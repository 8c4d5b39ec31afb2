//! Wired control panel.
//!
//! The panel is a dumb terminal: the master pushes LED states and display
//! text to it, and key presses ride back in the panel's probe
//! acknowledgements (byte 3 of the ack payload). A recognized key toggles
//! the matching LED bit so the panel reflects the request immediately.

use tracing::{info, warn};

use super::{Device, DeviceError};

const OP_LED_STATUS: u8 = 0x02;
const OP_DISPLAY: u8 = 0x03;

/// The display takes at most this many characters per line.
const MAX_DISPLAY_LEN: usize = 13;

// LED bit positions in the status bitmask.
const LED_POOL: u32 = 1 << 0;
const LED_SPA: u32 = 1 << 1;
const LED_POOL_HEAT: u32 = 1 << 2;
const LED_SPA_HEAT: u32 = 1 << 3;
const LED_AUX1: u32 = 1 << 4;

fn button_name(code: u8) -> Option<&'static str> {
    Some(match code {
        0x01 => "spa",
        0x02 => "pool",
        0x05 => "aux1",
        0x06 => "aux4",
        0x0a => "aux2",
        0x0b => "aux5",
        0x0f => "aux3",
        0x10 => "aux6",
        0x12 => "pool heat",
        0x15 => "aux7",
        0x17 => "spa heat",
        0x1c => "aux extra",
        _ => return None,
    })
}

fn button_led(code: u8) -> Option<u32> {
    Some(match code {
        0x01 => LED_SPA,
        0x02 => LED_POOL,
        0x05 => LED_AUX1,
        0x12 => LED_POOL_HEAT,
        0x17 => LED_SPA_HEAT,
        _ => return None,
    })
}

/// Control panel device state.
pub struct ControlPanel {
    leds: u32,
    display: String,
    send_display: bool,
}

impl ControlPanel {
    /// Create a panel with all LEDs off and an empty display.
    pub fn new() -> Self {
        Self {
            leds: 0,
            display: String::new(),
            send_display: true,
        }
    }

    /// Set the text pushed to the panel display.
    ///
    /// # Errors
    ///
    /// [`DeviceError::TextTooLong`] past thirteen bytes.
    pub fn set_display(&mut self, text: &str) -> Result<(), DeviceError> {
        if text.len() > MAX_DISPLAY_LEN {
            return Err(DeviceError::TextTooLong);
        }
        self.display.clear();
        self.display.push_str(text);
        Ok(())
    }

    /// Current LED bitmask.
    pub fn leds(&self) -> u32 {
        self.leds
    }

    /// Current display text.
    pub fn display(&self) -> &str {
        &self.display
    }
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for ControlPanel {
    fn name(&self) -> &'static str {
        "rs-panel"
    }

    fn handle_reply(&mut self, reply: &[u8]) -> Result<(), DeviceError> {
        // Key presses arrive in the acks; nothing else is expected.
        Err(DeviceError::UnknownOpcode(reply[1]))
    }

    fn handle_probe_reply(&mut self, reply: &[u8]) {
        let Some(&code) = reply.get(3) else {
            return;
        };
        if code == 0 {
            return;
        }

        match button_name(code) {
            Some(name) => {
                info!("button '{}' ({:#04x}) pressed", name, code);
                if let Some(led) = button_led(code) {
                    self.leds ^= led;
                }
            }
            None => warn!("unknown panel key code {:#04x}", code),
        }
    }

    fn next_request(&mut self, buf: &mut [u8]) -> Option<usize> {
        self.send_display = !self.send_display;

        if !self.send_display {
            buf[1] = OP_LED_STATUS;
            buf[2..6].copy_from_slice(&self.leds.to_be_bytes());
            buf[6] = !(self.leds as u8);
            Some(7)
        } else {
            if self.display.is_empty() {
                return None;
            }
            buf[1] = OP_DISPLAY;
            buf[2] = 0x00;
            let text = self.display.as_bytes();
            buf[3..3 + text.len()].copy_from_slice(text);
            Some(3 + text.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_press_toggles_led() {
        let mut panel = ControlPanel::new();

        panel.handle_probe_reply(&[0x00, 0x01, 0x00, 0x02]);
        assert_eq!(panel.leds(), LED_POOL);

        panel.handle_probe_reply(&[0x00, 0x01, 0x00, 0x02]);
        assert_eq!(panel.leds(), 0);
    }

    #[test]
    fn test_idle_and_short_acks_are_ignored() {
        let mut panel = ControlPanel::new();

        panel.handle_probe_reply(&[0x00, 0x01, 0x00, 0x00]);
        panel.handle_probe_reply(&[0x00, 0x01]);
        assert_eq!(panel.leds(), 0);
    }

    #[test]
    fn test_unknown_key_leaves_leds_untouched() {
        let mut panel = ControlPanel::new();
        panel.handle_probe_reply(&[0x00, 0x01, 0x00, 0x7f]);
        assert_eq!(panel.leds(), 0);
    }

    #[test]
    fn test_led_frame_carries_inverted_check_byte() {
        let mut panel = ControlPanel::new();
        panel.handle_probe_reply(&[0x00, 0x01, 0x00, 0x01]); // spa
        panel.handle_probe_reply(&[0x00, 0x01, 0x00, 0x17]); // spa heat

        let mut buf = [0u8; 16];
        let len = panel.next_request(&mut buf).unwrap();

        let leds = LED_SPA | LED_SPA_HEAT;
        assert_eq!(len, 7);
        assert_eq!(buf[1], OP_LED_STATUS);
        assert_eq!(&buf[2..6], leds.to_be_bytes());
        assert_eq!(buf[6], !(leds as u8));
    }

    #[test]
    fn test_display_request_follows_led_refresh() {
        let mut panel = ControlPanel::new();
        panel.set_display("POOL 24C").unwrap();
        let mut buf = [0u8; 16];

        let len = panel.next_request(&mut buf).unwrap();
        assert_eq!(buf[1], OP_LED_STATUS);
        assert_eq!(len, 7);

        let len = panel.next_request(&mut buf).unwrap();
        assert_eq!(buf[1], OP_DISPLAY);
        assert_eq!(buf[2], 0x00);
        assert_eq!(&buf[3..len], b"POOL 24C");
    }

    #[test]
    fn test_empty_display_declines_the_cycle() {
        let mut panel = ControlPanel::new();
        let mut buf = [0u8; 16];

        assert!(panel.next_request(&mut buf).is_some()); // LED refresh
        assert!(panel.next_request(&mut buf).is_none()); // nothing to show
        assert!(panel.next_request(&mut buf).is_some()); // LED refresh again
    }

    #[test]
    fn test_display_length_is_capped() {
        let mut panel = ControlPanel::new();
        assert_eq!(panel.set_display("1234567890123"), Ok(()));
        assert_eq!(
            panel.set_display("12345678901234"),
            Err(DeviceError::TextTooLong)
        );
        assert_eq!(panel.display(), "1234567890123");
    }
}
