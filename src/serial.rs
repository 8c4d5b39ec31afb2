//! Serial port handling.
//!
//! Opens and configures the RS-485 TTY the engine drives: 9600 baud,
//! 8N1, no flow control, RS-485 mode with RTS asserted while sending.
//! Any failure here is fatal to startup; the process cannot run without
//! its bus.

use tokio_serial::{DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream, StopBits};

use crate::error::BusError;

/// The bus clock rate. Fixed by the equipment, not configurable.
pub const BAUD_RATE: u32 = 9600;

/// Open and configure the bus TTY.
///
/// The port is opened non-blocking and its input buffer is flushed, so
/// the engine starts from a clean line rather than replaying whatever
/// accumulated in the kernel buffer before launch.
pub fn open(path: &str) -> Result<SerialStream, BusError> {
    let port = tokio_serial::new(path, BAUD_RATE)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|err| BusError::Serial(format!("{}: cannot open tty: {}", path, err)))?;

    enable_rs485(&port)?;
    port.clear(tokio_serial::ClearBuffer::Input)?;

    Ok(port)
}

/// Put the UART into RS-485 half-duplex mode, driving RTS during sends.
#[cfg(target_os = "linux")]
fn enable_rs485(port: &SerialStream) -> Result<(), BusError> {
    use std::os::unix::io::AsRawFd;

    const TIOCSRS485: libc::c_ulong = 0x542f;
    const SER_RS485_ENABLED: u32 = 1 << 0;
    const SER_RS485_RTS_ON_SEND: u32 = 1 << 1;

    #[repr(C)]
    struct SerialRs485 {
        flags: u32,
        delay_rts_before_send: u32,
        delay_rts_after_send: u32,
        padding: [u32; 5],
    }

    let config = SerialRs485 {
        flags: SER_RS485_ENABLED | SER_RS485_RTS_ON_SEND,
        delay_rts_before_send: 0,
        delay_rts_after_send: 0,
        padding: [0; 5],
    };

    let ret = unsafe { libc::ioctl(port.as_raw_fd(), TIOCSRS485, &config) };
    if ret != 0 {
        return Err(BusError::Serial(format!(
            "cannot set RS-485 mode: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn enable_rs485(_port: &SerialStream) -> Result<(), BusError> {
    Ok(())
}
