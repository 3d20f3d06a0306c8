//! Rendering of command results

use multiwire::{AddressRecord, Scope, split_addresses};
use serde_json::json;

use crate::cli::OutputFormat;
use crate::error::CliResult;

/// Render a decoded address
pub fn render_record(format: OutputFormat, record: &AddressRecord) -> CliResult<String> {
    match format {
        OutputFormat::Human => Ok(format!(
            "transport: {}\nhost:      {}\nport:      {}",
            record.transport, record.host, record.port
        )),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(record)?),
    }
}

/// Render the advertised addresses of each scope; `None` means nothing is
/// advertised there.
pub fn render_addresses(
    format: OutputFormat,
    entries: &[(Scope, Option<String>)],
) -> CliResult<String> {
    match format {
        OutputFormat::Human => Ok(entries
            .iter()
            .map(|(scope, joined)| match joined {
                Some(joined) => format!("{scope}\t{joined}"),
                None => format!("{scope}\t-"),
            })
            .collect::<Vec<_>>()
            .join("\n")),
        OutputFormat::Json => {
            let rows: Vec<_> = entries
                .iter()
                .map(|(scope, joined)| {
                    json!({
                        "scope": scope,
                        "addresses": joined
                            .as_deref()
                            .map(|joined| split_addresses(joined).collect::<Vec<_>>())
                            .unwrap_or_default(),
                    })
                })
                .collect();
            Ok(serde_json::to_string_pretty(&rows)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_record() {
        let record = AddressRecord::new("net", "127.0.0.1", 8008);
        assert_eq!(
            render_record(OutputFormat::Human, &record).unwrap(),
            "transport: net\nhost:      127.0.0.1\nport:      8008"
        );
        let value: serde_json::Value =
            serde_json::from_str(&render_record(OutputFormat::Json, &record).unwrap()).unwrap();
        assert_eq!(value, json!({"transport": "net", "host": "127.0.0.1", "port": 8008}));
    }

    #[test]
    fn test_render_addresses() {
        let entries = vec![
            (
                Scope::Device,
                Some("net:127.0.0.1:8008;net:::1:8008".to_string()),
            ),
            (Scope::Public, None),
        ];
        assert_eq!(
            render_addresses(OutputFormat::Human, &entries).unwrap(),
            "device\tnet:127.0.0.1:8008;net:::1:8008\npublic\t-"
        );

        let value: serde_json::Value =
            serde_json::from_str(&render_addresses(OutputFormat::Json, &entries).unwrap())
                .unwrap();
        assert_eq!(
            value,
            json!([
                {"scope": "device", "addresses": ["net:127.0.0.1:8008", "net:::1:8008"]},
                {"scope": "public", "addresses": []},
            ])
        );
    }
}
