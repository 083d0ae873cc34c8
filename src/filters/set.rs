use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TimelineError;

/// A single visual filter that can be applied to a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    None,
    Grayscale,
    NightVision,
    Vhs,
}

impl Filter {
    pub const ALL: [Filter; 4] = [Filter::None, Filter::Grayscale, Filter::NightVision, Filter::Vhs];

    /// Canonical identifier, as used in configuration and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Filter::None => "none",
            Filter::Grayscale => "grayscale",
            Filter::NightVision => "nightVision",
            Filter::Vhs => "vhs",
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Filter {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "none" => Ok(Filter::None),
            "grayscale" | "greyscale" => Ok(Filter::Grayscale),
            "nightvision" => Ok(Filter::NightVision),
            "vhs" => Ok(Filter::Vhs),
            _ => Err(TimelineError::UnknownIdentifier {
                kind: "filter",
                value: s.to_string(),
            }),
        }
    }
}

/// The filters applied to a clip.
///
/// Never empty: an empty selection normalizes to `{none}`, and `none` cannot be
/// combined with any other filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Filter>", into = "Vec<Filter>")]
pub struct FilterSet {
    filters: BTreeSet<Filter>,
}

impl FilterSet {
    /// The identity set `{none}`
    pub fn none() -> Self {
        Self {
            filters: BTreeSet::from([Filter::None]),
        }
    }

    pub fn new<I: IntoIterator<Item = Filter>>(filters: I) -> Result<Self, TimelineError> {
        let filters: BTreeSet<Filter> = filters.into_iter().collect();
        if filters.is_empty() {
            return Ok(Self::none());
        }

        if filters.contains(&Filter::None) && filters.len() > 1 {
            return Err(TimelineError::InvalidFilters {
                details: format!(
                    "'none' cannot be combined with {}",
                    filters
                        .iter()
                        .filter(|f| **f != Filter::None)
                        .map(Filter::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            });
        }

        Ok(Self { filters })
    }

    pub fn single(filter: Filter) -> Self {
        Self {
            filters: BTreeSet::from([filter]),
        }
    }

    pub fn contains(&self, filter: Filter) -> bool {
        self.filters.contains(&filter)
    }

    /// True when the set renders frames unchanged
    pub fn is_identity(&self) -> bool {
        self.filters.iter().all(|f| *f == Filter::None)
    }

    pub fn iter(&self) -> impl Iterator<Item = Filter> + '_ {
        self.filters.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Default for FilterSet {
    fn default() -> Self {
        Self::none()
    }
}

impl TryFrom<Vec<Filter>> for FilterSet {
    type Error = TimelineError;

    fn try_from(filters: Vec<Filter>) -> Result<Self, Self::Error> {
        Self::new(filters)
    }
}

impl From<FilterSet> for Vec<Filter> {
    fn from(set: FilterSet) -> Self {
        set.filters.into_iter().collect()
    }
}

impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.filters.iter().map(Filter::as_str).collect();
        f.write_str(&names.join(","))
    }
}

/// Parses a comma-separated list such as `grayscale,vhs`
impl FromStr for FilterSet {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let filters = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Filter::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_normalizes_to_none() {
        let set = FilterSet::new([]).unwrap();
        assert_eq!(set, FilterSet::none());
        assert!(set.is_identity());
        assert_eq!("".parse::<FilterSet>().unwrap(), FilterSet::none());
    }

    #[test]
    fn test_none_is_exclusive() {
        let err = FilterSet::new([Filter::None, Filter::Vhs]).unwrap_err();
        assert!(matches!(err, TimelineError::InvalidFilters { .. }));
        assert!("none,grayscale".parse::<FilterSet>().is_err());
    }

    #[test]
    fn test_parse_identifiers() {
        assert_eq!("nightVision".parse::<Filter>().unwrap(), Filter::NightVision);
        assert_eq!("night-vision".parse::<Filter>().unwrap(), Filter::NightVision);
        assert!(matches!(
            "sepia".parse::<Filter>(),
            Err(TimelineError::UnknownIdentifier { kind: "filter", .. })
        ));

        let set: FilterSet = "vhs, grayscale".parse().unwrap();
        assert!(set.contains(Filter::Grayscale));
        assert!(set.contains(Filter::Vhs));
        assert_eq!(set.to_string(), "grayscale,vhs");
    }

    #[test]
    fn test_serde_validates() {
        let set: FilterSet = serde_json::from_str(r#"["grayscale","nightVision"]"#).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(
            serde_json::to_string(&set).unwrap(),
            r#"["grayscale","nightVision"]"#
        );
        assert!(serde_json::from_str::<FilterSet>(r#"["none","vhs"]"#).is_err());
        assert!(serde_json::from_str::<FilterSet>(r#"["sepia"]"#).is_err());
    }
}
