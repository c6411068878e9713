use std::{fmt::Display, ops::Deref, str::FromStr};

use anyhow::anyhow;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

impl Percentage {
    pub fn new_opt(value: f64) -> Option<Percentage> {
        if value < 0. {
            None
        } else {
            Some(Percentage(value))
        }
    }
}

impl FromStr for Percentage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // This means that 100%% also works, but I think I'm fine with that
        let s = s.trim_end_matches("%");
        let v = s.parse::<f64>()?;
        Percentage::new_opt(v).ok_or_else(|| anyhow!("Can't parse {s} into percentage"))
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Share of `value_ms` within `total_ms`. A zero total is 0%, not a division
/// error.
pub fn share_of_total(value_ms: u64, total_ms: u64) -> Percentage {
    if total_ms == 0 {
        return Percentage(0.);
    }
    Percentage(value_ms as f64 / total_ms as f64 * 100.)
}

#[cfg(test)]
mod tests {
    use super::{share_of_total, Percentage};

    #[test]
    fn test_share_of_total() {
        assert_eq!(*share_of_total(2500, 10_000), 25.);
        assert_eq!(*share_of_total(0, 10_000), 0.);
        assert_eq!(*share_of_total(500, 0), 0.);
    }

    #[test]
    fn test_parse() {
        assert_eq!(*("25%".parse::<Percentage>().unwrap()), 25.);
        assert!("-3%".parse::<Percentage>().is_err());
    }
}
