use serde::Serialize;

/// Round lifecycle for a channel. Exactly one phase is active; the
/// engines own every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Betting,
    Dealing,
    Action,
    Showdown,
    Settled,
}

impl Phase {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Betting => "betting",
            Self::Dealing => "dealing",
            Self::Action => "action",
            Self::Showdown => "showdown",
            Self::Settled => "settled",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The four betting rounds in Texas Hold'em.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Default)]
pub enum Street {
    #[default]
    #[serde(rename = "preflop")]
    Pref,
    #[serde(rename = "flop")]
    Flop,
    #[serde(rename = "turn")]
    Turn,
    #[serde(rename = "river")]
    Rive,
}

impl Street {
    /// Community cards revealed when this street begins.
    pub const fn reveals(&self) -> usize {
        match self {
            Self::Pref => 0,
            Self::Flop => 3,
            Self::Turn => 1,
            Self::Rive => 1,
        }
    }
    /// The following street, if any.
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Pref => Some(Self::Flop),
            Self::Flop => Some(Self::Turn),
            Self::Turn => Some(Self::Rive),
            Self::Rive => None,
        }
    }
}

impl std::fmt::Display for Street {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Pref => write!(f, "preflop"),
            Self::Flop => write!(f, "flop"),
            Self::Turn => write!(f, "turn"),
            Self::Rive => write!(f, "river"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streets_reveal_3_1_1() {
        let mut street = Street::Pref;
        let mut revealed = 0;
        while let Some(next) = street.next() {
            street = next;
            revealed += street.reveals();
        }
        assert_eq!(street, Street::Rive);
        assert_eq!(revealed, 5);
    }
}
