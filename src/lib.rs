//! # poolbus
//!
//! Bus master for the 9600-baud RS-485 field bus used by Aqualink-style
//! pool equipment (gas heaters, wired control panels, auxiliary devices).
//!
//! The master is the only device that initiates traffic. It probes
//! addresses to discover slaves, polls each registered slave in turn,
//! matches every reply to the request at the head of the transmit queue,
//! times out silent peers, and dispatches decoded payloads to per-device
//! handlers.
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]): the byte-stuffed frame codec with
//!   mod-256 checksum, and the scanner that finds frames in the raw
//!   receive stream.
//! - **Devices** ([`device`]): the [`Device`] trait and the concrete
//!   heater and panel implementations behind it.
//! - **Engine** ([`engine`]): a single-task event loop that owns the
//!   serial stream, the transmit queue, the slave registry and every
//!   timer. Strictly one request in flight at a time.
//!
//! ## Example
//!
//! ```ignore
//! use poolbus::{JxiHeater, Master, SlaveRegistry, JXI_HEATER_ADDR};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), poolbus::BusError> {
//!     let port = poolbus::serial::open("/dev/ttyS0")?;
//!
//!     let mut registry = SlaveRegistry::new();
//!     registry.add(JXI_HEATER_ADDR, Box::new(JxiHeater::new()))?;
//!
//!     Master::new(port, registry).run().await
//! }
//! ```

pub mod device;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod registry;
pub mod serial;

pub use device::{ControlPanel, Device, DeviceError, JxiHeater, JXI_HEATER_ADDR};
pub use engine::Master;
pub use error::{BusError, FrameError};
pub use registry::SlaveRegistry;
