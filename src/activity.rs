use crate::fix::RoutePoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Finalized ride handed to persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub name: String,
    pub date: DateTime<Utc>,
    /// Kilometers
    pub distance: f64,
    /// Seconds
    pub duration: u64,
    /// km/h
    pub average_speed: f64,
    /// km/h
    pub max_speed: f64,
    #[serde(default)]
    pub elevation_gain: f64,
    #[serde(default)]
    pub route: Vec<RoutePoint>,
    #[serde(default)]
    pub notes: String,
}

/// Name used when the rider saves without typing one
pub fn default_activity_name(started_at: DateTime<Utc>) -> String {
    format!("Ride {}", started_at.format("%Y-%m-%d %H:%M"))
}

impl Activity {
    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Generate GPX document XML string
    pub fn to_gpx(&self) -> String {
        let name = escape_xml(&self.name);
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<gpx version=\"1.1\" creator=\"ride_tracker\" xmlns=\"http://www.topografix.com/GPX/1/1\">\n");
        xml.push_str("  <metadata>\n");
        xml.push_str(&format!("    <name>{}</name>\n", name));
        if !self.notes.is_empty() {
            xml.push_str(&format!("    <desc>{}</desc>\n", escape_xml(&self.notes)));
        }
        xml.push_str(&format!("    <time>{}</time>\n", self.date.to_rfc3339()));
        xml.push_str("  </metadata>\n");
        xml.push_str("  <trk>\n");
        xml.push_str(&format!("    <name>{}</name>\n", name));
        xml.push_str("    <type>cycling</type>\n");
        xml.push_str("    <trkseg>\n");

        for point in &self.route {
            xml.push_str(&format!("      <trkpt lat=\"{}\" lon=\"{}\">\n", point.lat, point.lng));
            xml.push_str(&format!("        <ele>{}</ele>\n", point.elevation));
            xml.push_str("      </trkpt>\n");
        }

        xml.push_str("    </trkseg>\n");
        xml.push_str("  </trk>\n");
        xml.push_str("</gpx>\n");

        xml
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
