/// The four suits. Order is arbitrary but fixed by the u8 packing.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Suit {
    C = 0,
    D = 1,
    H = 2,
    S = 3,
}

impl Suit {
    pub const fn all() -> [Self; 4] {
        [Self::C, Self::D, Self::H, Self::S]
    }
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::C => "c",
            Self::D => "d",
            Self::H => "h",
            Self::S => "s",
        }
    }
}

impl From<u8> for Suit {
    fn from(n: u8) -> Self {
        match n {
            0 => Self::C,
            1 => Self::D,
            2 => Self::H,
            3 => Self::S,
            x => panic!("no such suit {}", x),
        }
    }
}

impl From<Suit> for u8 {
    fn from(s: Suit) -> u8 {
        s as u8
    }
}

impl TryFrom<&str> for Suit {
    type Error = super::InvalidHand;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "c" => Ok(Self::C),
            "d" => Ok(Self::D),
            "h" => Ok(Self::H),
            "s" => Ok(Self::S),
            _ => Err(super::InvalidHand("unrecognized suit character")),
        }
    }
}

impl std::fmt::Display for Suit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
