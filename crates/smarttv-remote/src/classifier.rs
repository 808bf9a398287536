//! # Brand Classifier
//!
//! Turns one HTTP response (status, headers, body sample) into a
//! [`DetectedTv`]. Pure and infallible: no match yields an `"Unknown"`
//! classification rather than an error.
//!
//! Evidence is weighed in a fixed order and the first hit wins:
//!
//! 1. the `Server` header, then every other header value
//! 2. the body, with a word-boundary rule for the bare token `lg`
//! 3. the port the response came from
//! 4. nothing matched: `"Unknown"` / `"TV Device"`

use std::sync::LazyLock;

use regex::Regex;

use crate::model::DetectedTv;

/// Vendors the classifier can recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Brand {
    Samsung,
    Lg,
    Sony,
    Philips,
    Tcl,
    Hisense,
}

/// Lowercase tokens and the brand they imply, in match order.
const BRAND_TOKENS: &[(&str, Brand)] = &[
    ("samsung", Brand::Samsung),
    ("tizen", Brand::Samsung),
    ("webos", Brand::Lg),
    ("sony", Brand::Sony),
    ("bravia", Brand::Sony),
    ("philips", Brand::Philips),
    ("tcl", Brand::Tcl),
    ("roku", Brand::Tcl),
    ("hisense", Brand::Hisense),
];

/// Fallback when neither headers nor body identify the vendor.
const PORT_TABLE: &[(u16, Brand)] = &[
    (8001, Brand::Samsung),
    (8002, Brand::Samsung),
    (7001, Brand::Samsung),
    (80, Brand::Samsung),
    (3000, Brand::Lg),
    (3001, Brand::Lg),
    (1925, Brand::Philips),
];

static LG_WORD: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)\blg\b").ok());

impl Brand {
    /// Manufacturer string published for this brand.
    pub fn as_str(self) -> &'static str {
        match self {
            Brand::Samsung => "Samsung",
            Brand::Lg => "LG",
            Brand::Sony => "Sony",
            Brand::Philips => "Philips",
            Brand::Tcl => "TCL",
            Brand::Hisense => "Hisense",
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            Brand::Samsung => "Smart TV",
            Brand::Lg => "webOS TV",
            Brand::Sony => "Bravia TV",
            Brand::Philips => "Philips TV",
            Brand::Tcl => "TCL TV",
            Brand::Hisense => "Hisense TV",
        }
    }

    fn model(self) -> &'static str {
        match self {
            Brand::Samsung => "Samsung Tizen Smart TV",
            Brand::Lg => "LG webOS Smart TV",
            Brand::Sony => "Sony Bravia Smart TV",
            Brand::Philips => "Philips Smart TV",
            Brand::Tcl => "TCL Smart TV",
            Brand::Hisense => "Hisense Smart TV",
        }
    }

    fn detected(self, model: String, host: &str, port: u16) -> DetectedTv {
        DetectedTv {
            manufacturer: self.as_str().to_string(),
            name: self.display_name().to_string(),
            model,
            ip: host.to_string(),
            port,
        }
    }
}

/// Classify one HTTP response from `host:port`.
pub fn classify(
    host: &str,
    port: u16,
    status: u16,
    headers: &[(String, String)],
    body: &str,
) -> DetectedTv {
    if let Some(brand) = brand_from_headers(headers) {
        tracing::trace!(host, port, status, brand = brand.as_str(), "Brand from headers");
        return brand.detected(brand.model().to_string(), host, port);
    }

    if let Some(brand) = brand_from_body(body) {
        tracing::trace!(host, port, status, brand = brand.as_str(), "Brand from body");
        return brand.detected(brand.model().to_string(), host, port);
    }

    if let Some(brand) = brand_from_port(port) {
        tracing::trace!(host, port, status, brand = brand.as_str(), "Brand from port");
        let model = format!("{} Smart TV (Port {port})", brand.as_str());
        return brand.detected(model, host, port);
    }

    DetectedTv {
        manufacturer: "Unknown".to_string(),
        name: "TV Device".to_string(),
        model: format!("Unknown TV (Port {port})"),
        ip: host.to_string(),
        port,
    }
}

fn brand_in(text: &str) -> Option<Brand> {
    let lower = text.to_ascii_lowercase();
    BRAND_TOKENS
        .iter()
        .find(|(token, _)| lower.contains(token))
        .map(|(_, brand)| *brand)
}

/// `Server` first, then the remaining headers in the order received.
pub fn brand_from_headers(headers: &[(String, String)]) -> Option<Brand> {
    let server = headers
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case("server"))
        .find_map(|(_, value)| brand_in(value));
    server.or_else(|| {
        headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("server"))
            .find_map(|(_, value)| brand_in(value))
    })
}

/// Vendor tokens in the body. A bare `lg` counts only as a whole word and
/// only when `smart` also appears.
pub fn brand_from_body(body: &str) -> Option<Brand> {
    brand_in(body).or_else(|| {
        let has_smart = body.to_ascii_lowercase().contains("smart");
        let lg_word = LG_WORD.as_ref().is_some_and(|re| re.is_match(body));
        (has_smart && lg_word).then_some(Brand::Lg)
    })
}

pub fn brand_from_port(port: u16) -> Option<Brand> {
    PORT_TABLE
        .iter()
        .find(|(p, _)| *p == port)
        .map(|(_, brand)| *brand)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_server_header_wins_over_body_and_port() {
        let tv = classify(
            "192.168.1.7",
            3000,
            200,
            &headers(&[("Server", "Tizen/4.0 UPnP/1.0")]),
            "<html>webOS smart</html>",
        );
        assert_eq!(tv.manufacturer, "Samsung");
        assert_eq!(tv.model, "Samsung Tizen Smart TV");
        assert_eq!(tv.port, 3000);
    }

    #[test]
    fn test_server_header_checked_before_other_headers() {
        let tv = classify(
            "10.0.0.2",
            80,
            200,
            &headers(&[("X-Powered-By", "Roku"), ("Server", "Linux/3.0 Sony Bravia")]),
            "",
        );
        assert_eq!(tv.manufacturer, "Sony");
        assert_eq!(tv.model, "Sony Bravia Smart TV");
    }

    #[test]
    fn test_other_header_used_when_server_inconclusive() {
        let tv = classify(
            "10.0.0.3",
            9080,
            404,
            &headers(&[("Server", "nginx"), ("X-Device", "Hisense VIDAA")]),
            "",
        );
        assert_eq!(tv.manufacturer, "Hisense");
    }

    #[test]
    fn test_body_inspection_after_headers() {
        let tv = classify(
            "10.0.0.4",
            9080,
            200,
            &headers(&[("Server", "lighttpd")]),
            "Welcome to your PHILIPS Android TV",
        );
        assert_eq!(tv.manufacturer, "Philips");
        assert_eq!(tv.name, "Philips TV");
    }

    #[test]
    fn test_lg_word_boundary_rule() {
        // "lg" embedded in another word never counts
        assert_eq!(brand_from_body("algorithm for smart homes"), None);
        assert_eq!(brand_from_body("bulgaria smart"), None);
        // standalone but without "smart"
        assert_eq!(brand_from_body("LG Electronics"), None);
        // standalone plus "smart"
        assert_eq!(brand_from_body("LG Smart TV portal"), Some(Brand::Lg));
        assert_eq!(brand_from_body("smart display by lg."), Some(Brand::Lg));
    }

    #[test]
    fn test_port_fallback() {
        let tv = classify("10.0.0.5", 80, 200, &[], "hello");
        assert_eq!(tv.manufacturer, "Samsung");
        assert_eq!(tv.model, "Samsung Smart TV (Port 80)");

        let tv = classify("10.0.0.5", 3000, 401, &[], "");
        assert_eq!(tv.manufacturer, "LG");
        assert_eq!(tv.model, "LG Smart TV (Port 3000)");

        let tv = classify("10.0.0.5", 1925, 200, &[], "");
        assert_eq!(tv.manufacturer, "Philips");
    }

    #[test]
    fn test_unknown_when_nothing_matches() {
        let tv = classify("10.0.0.6", 9080, 200, &headers(&[("Server", "nginx")]), "ok");
        assert_eq!(tv.manufacturer, "Unknown");
        assert_eq!(tv.name, "TV Device");
        assert_eq!(tv.ip, "10.0.0.6");
        assert_eq!(tv.port, 9080);
    }
}
