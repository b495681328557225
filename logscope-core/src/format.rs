//! Format registry
//!
//! Static catalog of the log formats the engine understands. Each definition
//! names its fields in capture order and declares which fields carry an
//! anomaly rule.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatId {
    Nginx,
    Apache,
    Json,
    Syslog,
    Custom,
}

impl FormatId {
    pub const ALL: [FormatId; 5] = [
        FormatId::Nginx,
        FormatId::Apache,
        FormatId::Json,
        FormatId::Syslog,
        FormatId::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatId::Nginx => "nginx",
            FormatId::Apache => "apache",
            FormatId::Json => "json",
            FormatId::Syslog => "syslog",
            FormatId::Custom => "custom",
        }
    }

    pub fn supported() -> Vec<String> {
        Self::ALL.iter().map(|f| f.as_str().to_string()).collect()
    }
}

impl std::str::FromStr for FormatId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nginx" => Ok(FormatId::Nginx),
            "apache" => Ok(FormatId::Apache),
            "json" => Ok(FormatId::Json),
            "syslog" => Ok(FormatId::Syslog),
            "custom" => Ok(FormatId::Custom),
            _ => Err(s.to_string()),
        }
    }
}

impl std::fmt::Display for FormatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Ms,
    Us,
}

impl DurationUnit {
    pub fn suffix(&self) -> &'static str {
        match self {
            DurationUnit::Ms => "ms",
            DurationUnit::Us => "us",
        }
    }
}

/// Detection rule attached to a format field. Each variant carries only what
/// its rule reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnomalyFieldConfig {
    HttpStatus {
        #[serde(rename = "criticalCodes")]
        critical_codes: Vec<&'static str>,
    },
    LogLevel {
        #[serde(rename = "criticalLevels")]
        critical_levels: Vec<&'static str>,
    },
    Duration {
        unit: DurationUnit,
        #[serde(rename = "warningMs")]
        warning_ms: u64,
        #[serde(rename = "criticalMs")]
        critical_ms: u64,
    },
    IpAddress,
    SyslogPriority {
        #[serde(rename = "criticalCodes")]
        critical_codes: Vec<u8>,
    },
}

#[derive(Debug)]
pub struct FormatDefinition {
    pub id: FormatId,
    pub display_name: &'static str,
    /// `None` for JSON lines and for custom formats, whose pattern arrives
    /// with the request.
    pub pattern: Option<Regex>,
    pub fields: Vec<&'static str>,
    pub anomaly_fields: Vec<(&'static str, AnomalyFieldConfig)>,
    pub example: &'static str,
}

impl FormatDefinition {
    pub fn anomaly_config(&self, field: &str) -> Option<&AnomalyFieldConfig> {
        self.anomaly_fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, config)| config)
    }
}

const HTTP_FIELDS: [&str; 10] = [
    "ip",
    "remote_user",
    "timestamp",
    "method",
    "url",
    "protocol",
    "status",
    "size",
    "referer",
    "user_agent",
];

fn critical_http() -> AnomalyFieldConfig {
    AnomalyFieldConfig::HttpStatus {
        critical_codes: vec!["500", "502", "503", "504"],
    }
}

fn build_registry() -> Vec<FormatDefinition> {
    let mut apache_fields = HTTP_FIELDS.to_vec();
    apache_fields.push("response_time");

    vec![
        FormatDefinition {
            id: FormatId::Nginx,
            display_name: "NGINX Access Log",
            pattern: Some(
                Regex::new(
                    r#"^(\S+) \S+ (\S+) \[([^\]]+)\] "(\S+) (\S+) ([^"]+)" (\d{3}) (\d+|-) "([^"]*)" "([^"]*)""#,
                )
                .expect("static nginx pattern"),
            ),
            fields: HTTP_FIELDS.to_vec(),
            anomaly_fields: vec![("status", critical_http()), ("ip", AnomalyFieldConfig::IpAddress)],
            example: r#"192.168.1.1 - - [10/Dec/2023:10:15:32 +0000] "GET /api/users HTTP/1.1" 200 1234 "-" "Mozilla/5.0""#,
        },
        FormatDefinition {
            id: FormatId::Apache,
            display_name: "Apache Combined Log",
            pattern: Some(
                Regex::new(
                    r#"^(\S+) \S+ (\S+) \[([^\]]+)\] "(\S+) (\S+) ([^"]+)" (\d{3}) (\d+|-) "([^"]*)" "([^"]*)"(?: (\d+))?"#,
                )
                .expect("static apache pattern"),
            ),
            fields: apache_fields,
            anomaly_fields: vec![
                ("status", critical_http()),
                ("ip", AnomalyFieldConfig::IpAddress),
                (
                    "response_time",
                    AnomalyFieldConfig::Duration {
                        unit: DurationUnit::Us,
                        warning_ms: 1000,
                        critical_ms: 5000,
                    },
                ),
            ],
            example: r#"10.0.0.5 - frank [10/Oct/2023:13:55:36 +0000] "GET /index.html HTTP/1.1" 200 2326 "http://example.com/" "Mozilla/5.0" 1532"#,
        },
        FormatDefinition {
            id: FormatId::Json,
            display_name: "JSON Lines",
            pattern: None,
            fields: vec![
                "timestamp",
                "level",
                "message",
                "request_id",
                "user_id",
                "duration",
                "status",
            ],
            anomaly_fields: vec![
                (
                    "level",
                    AnomalyFieldConfig::LogLevel {
                        critical_levels: vec!["error", "fatal", "critical"],
                    },
                ),
                ("status", critical_http()),
                (
                    "duration",
                    AnomalyFieldConfig::Duration {
                        unit: DurationUnit::Ms,
                        warning_ms: 1000,
                        critical_ms: 5000,
                    },
                ),
            ],
            example: r#"{"timestamp":"2023-12-10T10:15:32.000Z","level":"error","message":"Payment failed","request_id":"req-42","duration":1250}"#,
        },
        FormatDefinition {
            id: FormatId::Syslog,
            display_name: "Syslog (RFC 3164)",
            pattern: Some(
                Regex::new(
                    r"^(?:<(\d{1,3})>)?([A-Za-z]{3}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2})\s+(\S+)\s+([^:\[\s]+)(?:\[(\d+)\])?:\s*(.*)$",
                )
                .expect("static syslog pattern"),
            ),
            fields: vec!["priority", "timestamp", "hostname", "process", "pid", "message"],
            anomaly_fields: vec![(
                "priority",
                AnomalyFieldConfig::SyslogPriority {
                    critical_codes: vec![0, 1, 2, 3],
                },
            )],
            example: "<34>Dec 10 10:15:32 web01 sshd[4721]: Failed password for root from 10.0.0.9",
        },
        FormatDefinition {
            id: FormatId::Custom,
            display_name: "Custom Regex",
            pattern: None,
            fields: Vec::new(),
            anomaly_fields: Vec::new(),
            example: "2023-12-10 10:15:32 [worker-3] job finished in 420ms",
        },
    ]
}

fn registry() -> &'static [FormatDefinition] {
    static REGISTRY: OnceLock<Vec<FormatDefinition>> = OnceLock::new();
    REGISTRY.get_or_init(build_registry)
}

pub fn definition(id: FormatId) -> &'static FormatDefinition {
    registry()
        .iter()
        .find(|def| def.id == id)
        .unwrap_or_else(|| unreachable!("every FormatId has a registry entry"))
}

/// Catalog entry consumed by format pickers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatInfo {
    pub id: FormatId,
    pub name: &'static str,
    pub fields: Vec<&'static str>,
    pub example: &'static str,
    pub has_anomaly_detection: bool,
    pub anomaly_fields: Vec<AnomalyFieldInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomalyFieldInfo {
    pub field: &'static str,
    #[serde(flatten)]
    pub config: AnomalyFieldConfig,
}

pub fn log_formats() -> Vec<FormatInfo> {
    registry()
        .iter()
        .map(|def| FormatInfo {
            id: def.id,
            name: def.display_name,
            fields: def.fields.clone(),
            example: def.example,
            has_anomaly_detection: !def.anomaly_fields.is_empty(),
            anomaly_fields: def
                .anomaly_fields
                .iter()
                .map(|(field, config)| AnomalyFieldInfo {
                    field: *field,
                    config: config.clone(),
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ids_round_trip_through_strings() {
        for id in FormatId::ALL {
            assert_eq!(id.as_str().parse::<FormatId>(), Ok(id));
        }
        assert_eq!("NGINX".parse::<FormatId>(), Ok(FormatId::Nginx));
        assert!("logfmt".parse::<FormatId>().is_err());
    }

    #[test]
    fn test_examples_match_their_patterns() {
        for def in registry() {
            if let Some(pattern) = &def.pattern {
                let caps = pattern
                    .captures(def.example)
                    .unwrap_or_else(|| panic!("{} example does not match", def.id));
                assert_eq!(caps.len() - 1, def.fields.len(), "{} field count", def.id);
            }
        }
    }

    #[test]
    fn test_anomaly_config_lookup() {
        let nginx = definition(FormatId::Nginx);
        assert!(matches!(
            nginx.anomaly_config("status"),
            Some(AnomalyFieldConfig::HttpStatus { .. })
        ));
        assert_eq!(nginx.anomaly_config("ip"), Some(&AnomalyFieldConfig::IpAddress));
        assert_eq!(nginx.anomaly_config("url"), None);
    }

    #[test]
    fn test_catalog_serialization() {
        let formats = log_formats();
        assert_eq!(formats.len(), 5);

        let json = serde_json::to_value(&formats).unwrap();
        assert_eq!(json[0]["id"], "nginx");
        assert_eq!(json[0]["hasAnomalyDetection"], true);
        assert_eq!(json[0]["anomalyFields"][0]["field"], "status");
        assert_eq!(json[0]["anomalyFields"][0]["type"], "http_status");
        assert_eq!(json[4]["hasAnomalyDetection"], false);
    }
}
