pub mod builder;
pub mod device;
pub mod error;
pub mod event;
pub(crate) mod io;
pub mod message;
pub mod protocol;
pub mod registry;
pub mod state;
pub mod switch;
pub mod transport;
pub mod types;

pub use builder::SwitcherBuilder;
pub use device::Sw6Switcher;
pub use error::{Error, Result};
pub use event::SwitcherEvent;
pub use message::{DeviceError, Message, StatusDump, classify};
pub use protocol::{Command, LineFramer};
pub use registry::SwitcherRegistry;
pub use state::{NotifyPolicy, SwitcherState};
pub use switch::VideoSwitcher;
pub use transport::{DeviceAddress, MockPort, probe};
pub use types::{DeviceIdentity, Input};
