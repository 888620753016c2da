// PCAP Funnel - Country Statistics
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Aggregation of IP statistics by country.

use std::collections::HashMap;

use serde::Serialize;

use crate::lookup::IpLocation;
use crate::models::NOT_AVAILABLE;

use super::property::StatElement;

/// Traffic of one country and the IPs that make it up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryCount {
    /// ISO3 country code, or `N/A` for IPs without a known location.
    pub code: String,
    pub count: u64,
    /// IP stat elements located in this country, in statistic order.
    pub ips: Vec<StatElement>,
}

/// Group an IP statistic by country, in first-seen order.
pub fn count_by_country(
    stat: &[StatElement],
    locations: &HashMap<String, IpLocation>,
) -> Vec<CountryCount> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut countries: Vec<CountryCount> = Vec::new();

    for element in stat {
        let code = locations
            .get(&element.value)
            .map(|location| location.country.as_str())
            .unwrap_or(NOT_AVAILABLE);

        let slot = *index.entry(code).or_insert_with(|| {
            countries.push(CountryCount {
                code: code.to_string(),
                count: 0,
                ips: Vec::new(),
            });
            countries.len() - 1
        });
        countries[slot].count += element.count;
        countries[slot].ips.push(element.clone());
    }

    countries
}

/// Country with the largest count; the first one wins on ties.
///
/// Returns `None` when no country has a positive count.
pub fn top_country(countries: &[CountryCount]) -> Option<&CountryCount> {
    countries.iter().fold(None, |top: Option<&CountryCount>, country| match top {
        Some(best) if best.count >= country.count => Some(best),
        _ if country.count > 0 => Some(country),
        _ => top,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(country: &str) -> IpLocation {
        IpLocation {
            country: country.to_string(),
            city: "n/a".to_string(),
            lat: None,
            long: None,
        }
    }

    #[test]
    fn test_count_by_country() {
        let stat = vec![
            StatElement::new("1.1.1.1", 10),
            StatElement::new("8.8.8.8", 7),
            StatElement::new("10.0.0.1", 5),
            StatElement::new("1.0.0.1", 3),
        ];
        let mut locations = HashMap::new();
        locations.insert("1.1.1.1".to_string(), location("AUS"));
        locations.insert("1.0.0.1".to_string(), location("AUS"));
        locations.insert("8.8.8.8".to_string(), location("USA"));

        let countries = count_by_country(&stat, &locations);
        assert_eq!(countries.len(), 3);
        assert_eq!(countries[0].code, "AUS");
        assert_eq!(countries[0].count, 13);
        assert_eq!(countries[0].ips.len(), 2);
        assert_eq!(countries[2].code, NOT_AVAILABLE);
        assert_eq!(countries[2].count, 5);

        let top = top_country(&countries).unwrap();
        assert_eq!(top.code, "AUS");
    }

    #[test]
    fn test_top_country_ties_and_empty() {
        assert!(top_country(&[]).is_none());

        let stat = vec![StatElement::new("a", 4), StatElement::new("b", 4)];
        let mut locations = HashMap::new();
        locations.insert("a".to_string(), location("CZE"));
        locations.insert("b".to_string(), location("SVK"));
        let countries = count_by_country(&stat, &locations);
        assert_eq!(top_country(&countries).unwrap().code, "CZE");

        let zero = count_by_country(&[StatElement::new("a", 0)], &locations);
        assert!(top_country(&zero).is_none());
    }
}
