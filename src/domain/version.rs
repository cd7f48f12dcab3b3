use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Dotted numeric version as reported by the runtime (`1.4.0`, `1.25.0+git`).
///
/// Ordering compares components numerically, so `1.4.0 < 1.24.0`. Missing
/// components count as zero and anything after the leading digits of a
/// component is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    raw: String,
    components: Vec<u64>,
}

impl Version {
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let raw = raw.trim();
        if !raw.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(Error::InvalidVersion(raw.to_string()));
        }

        let components = raw
            .split('.')
            .map(|part| {
                let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
                if digits.is_empty() {
                    return Ok(0);
                }
                digits
                    .parse::<u64>()
                    .map_err(|_| Error::InvalidVersion(raw.to_string()))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self {
            raw: raw.to_string(),
            components,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn less_than(&self, other: &Version) -> bool {
        self < other
    }

    pub fn greater_or_equal(&self, other: &Version) -> bool {
        self >= other
    }

    fn component(&self, idx: usize) -> u64 {
        self.components.get(idx).copied().unwrap_or(0)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.raw
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn compares_numerically_not_lexicographically() {
        assert!(v("1.4.0").less_than(&v("1.24.0")));
        assert!(v("1.24.0").greater_or_equal(&v("1.4.0")));
        assert!(!v("1.24.0").less_than(&v("1.4.0")));
        assert!(v("1.9.9").less_than(&v("1.10.0")));
    }

    #[test]
    fn equal_versions_are_greater_or_equal() {
        assert!(v("1.24.0").greater_or_equal(&v("1.24.0")));
        assert!(!v("1.24.0").less_than(&v("1.24.0")));
    }

    #[test]
    fn missing_components_count_as_zero() {
        assert_eq!(v("1.4"), v("1.4.0"));
        assert!(v("1.4").less_than(&v("1.4.1")));
    }

    #[test]
    fn build_suffix_is_ignored_for_ordering() {
        assert_eq!(v("1.25.0+git"), v("1.25.0"));
        assert!(v("1.25.0+gitabc").greater_or_equal(&v("1.24.0")));
        assert_eq!(v("1.25.0+git").as_str(), "1.25.0+git");
    }

    #[test]
    fn rejects_components_too_large_to_compare() {
        assert!(matches!(
            Version::parse("1.99999999999999999999999.0"),
            Err(Error::InvalidVersion(_))
        ));
        assert!(v("18446744073709551615.0").greater_or_equal(&v("1.0")));
    }

    #[test]
    fn rejects_non_numeric_tokens() {
        assert!(matches!(
            Version::parse("latest"),
            Err(Error::InvalidVersion(_))
        ));
        assert!(Version::parse("").is_err());
    }

    #[test]
    fn agrees_with_componentwise_order() {
        let samples = ["0.9.0", "1.0.0", "1.4.0", "1.4.10", "1.24.0", "1.30.0", "2.0"];
        for a in samples {
            for b in samples {
                let expected = {
                    let pa: Vec<u64> = a.split('.').map(|x| x.parse().unwrap()).collect();
                    let pb: Vec<u64> = b.split('.').map(|x| x.parse().unwrap()).collect();
                    let len = pa.len().max(pb.len());
                    let pad = |p: &Vec<u64>| {
                        let mut p = p.clone();
                        p.resize(len, 0);
                        p
                    };
                    pad(&pa) < pad(&pb)
                };
                assert_eq!(v(a).less_than(&v(b)), expected, "{a} < {b}");
                assert_eq!(v(a).greater_or_equal(&v(b)), !expected, "{a} >= {b}");
            }
        }
    }
}
