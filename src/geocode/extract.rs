//! Best-effort field extraction from raw provider responses.

use std::collections::BTreeMap;

use super::providers::ExtractionRule;

/// Apply every rule to the whole body and collect the fields that matched.
///
/// A rule that does not match, or captures an empty string, is skipped; the
/// other fields are still returned.
pub fn extract_fields(body: &str, rules: &BTreeMap<String, ExtractionRule>) -> BTreeMap<String, String> {
    rules
        .iter()
        .filter_map(|(field, rule)| rule.find(body).map(|v| (field.clone(), v.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::providers::ProviderRegistry;

    fn rules(pairs: &[(&str, &str)]) -> BTreeMap<String, ExtractionRule> {
        pairs
            .iter()
            .map(|(f, p)| (f.to_string(), ExtractionRule::new(p).unwrap()))
            .collect()
    }

    fn lat_lng_rules() -> BTreeMap<String, ExtractionRule> {
        rules(&[("lat", r"<Lat>(.*?)</Lat>"), ("lng", r"<Lon>(.*?)</Lon>")])
    }

    #[test]
    fn test_extract_both() {
        let out = extract_fields("<Lat>51.5</Lat><Lon>-0.12</Lon>", &lat_lng_rules());
        assert_eq!(out.len(), 2);
        assert_eq!(out["lat"], "51.5");
        assert_eq!(out["lng"], "-0.12");
    }

    #[test]
    fn test_extract_partial() {
        let out = extract_fields("<Lat>51.5</Lat>", &lat_lng_rules());
        assert_eq!(out.len(), 1);
        assert_eq!(out["lat"], "51.5");
        assert!(!out.contains_key("lng"));
    }

    #[test]
    fn test_extract_nothing() {
        let out = extract_fields("<Error>no match</Error>", &lat_lng_rules());
        assert!(out.is_empty());
    }

    #[test]
    fn test_empty_capture_omitted() {
        let out = extract_fields("<Lat></Lat><Lon>-0.12</Lon>", &lat_lng_rules());
        assert!(!out.contains_key("lat"));
        assert_eq!(out["lng"], "-0.12");
    }

    #[test]
    fn test_first_match_wins() {
        let out = extract_fields("<Lat>1</Lat><Lat>2</Lat>", &lat_lng_rules());
        assert_eq!(out["lat"], "1");
    }

    #[test]
    fn test_google_coordinates() {
        let registry = ProviderRegistry::builtin().unwrap();
        let google = registry.get("google").unwrap();
        let body = "<kml>\n<Placemark>\n<address>10 Downing St, London SW1A 2AA, UK</address>\n\
                    <CountryNameCode>GB</CountryNameCode>\n\
                    <PostalCodeNumber>SW1A 2AA</PostalCodeNumber>\n\
                    <Point><coordinates>-0.1276250,51.5033630,0</coordinates></Point>\n</Placemark>\n</kml>";
        let out = extract_fields(body, &google.field_rules);
        assert_eq!(out["lng"], "-0.1276250");
        assert_eq!(out["lat"], "51.5033630");
        assert_eq!(out["address1"], "10 Downing St, London SW1A 2AA, UK");
        assert_eq!(out["postcode"], "SW1A 2AA");
        assert_eq!(out["country"], "GB");
    }

    #[test]
    fn test_yahoo_town() {
        let registry = ProviderRegistry::builtin().unwrap();
        let yahoo = registry.get("yahoo").unwrap();
        let body = "<Result><Latitude>37.416397</Latitude><Longitude>-122.025055</Longitude>\
                    <City>Sunnyvale, </City><Zip>94089</Zip><Country>US</Country></Result>";
        let out = extract_fields(body, &yahoo.field_rules);
        assert_eq!(out["town"], "Sunnyvale");
        assert_eq!(out["postcode"], "94089");
        assert_eq!(out.len(), 5);
    }
}
