use std::fmt;

/// A switcher input, guaranteed to lie in `1..=6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Input(u8);

impl Input {
    /// Lowest input number.
    pub const MIN: u8 = 1;
    /// Highest input number (the SW6 has six inputs).
    pub const MAX: u8 = 6;

    /// Returns `None` if `n` is outside `1..=6`.
    pub fn new(n: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&n).then_some(Self(n))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// All inputs in ascending order.
    pub fn all() -> impl Iterator<Item = Input> {
        (Self::MIN..=Self::MAX).map(Input)
    }
}

impl TryFrom<u8> for Input {
    type Error = crate::Error;

    fn try_from(n: u8) -> crate::Result<Self> {
        Input::new(n).ok_or(crate::Error::InvalidInput(n))
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static identity of a switcher, for device registries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub name: &'static str,
    /// Normalized device address; unique per configured switcher.
    pub identifier: String,
}

impl DeviceIdentity {
    pub(crate) fn sw6(identifier: String) -> Self {
        Self {
            manufacturer: "Extron",
            model: "SW6 VGA Audio",
            name: "Extron SW6 VGA Switcher",
            identifier,
        }
    }
}
