//! TOML parser with helpful error messages

use super::schema::FleetswapConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse fleetswap.toml with detailed error messages
pub fn parse_fleetswap_toml(path: &Path) -> Result<FleetswapConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_fleetswap_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse fleetswap.toml content from string
pub fn parse_fleetswap_toml_str(content: &str) -> Result<FleetswapConfig> {
    let config: FleetswapConfig =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    config.validate()?;

    Ok(config)
}

/// Enhance TOML parsing errors with the offending lines
fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let error_msg = error.message().to_string();

    let line_num = error
        .span()
        .map(|span| content[..span.start.min(content.len())].lines().count().max(1));

    match line_num {
        Some(line_num) => anyhow::anyhow!(
            "TOML parsing error at line {}:\n{}\n\nError: {}",
            line_num,
            get_line_context(content, line_num),
            error_msg
        ),
        None => anyhow::anyhow!("TOML parsing error: {}", error_msg),
    }
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2).min(lines.len());
    let end = (line_num + 2).min(lines.len());

    lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
project = "shop"
region = "eu-west-1"
zones = ["eu-west-1a", "eu-west-1b"]

[environments.stage]
zone = "shop.example."
base_url = "shop.example."
urls = ["www.shop.example."]
qa_urls = ["www.qa{index}.shop.example."]
ami_image_id = "ami-123"
"#;

    #[test]
    fn test_parse_minimal_config() {
        let config = parse_fleetswap_toml_str(MINIMAL).unwrap();
        assert_eq!(config.project, "shop");
        assert_eq!(config.production_environment, "live");
        assert_eq!(config.polling.interval_ms, 1000);
        assert_eq!(config.cutover.settle_seconds, 15);

        let stage = &config.environments["stage"];
        assert_eq!(stage.instance_type, "t2.medium");
        assert_eq!(stage.desired_capacity, 1);
        assert_eq!(stage.default_cooldown, 180);
        assert_eq!(stage.adjustment_down, -1);
    }

    #[test]
    fn test_parse_invalid_toml_reports_line() {
        let toml = "project = \"shop\"\nregion = [unclosed\n";
        let err = parse_fleetswap_toml_str(toml).unwrap_err().to_string();
        assert!(err.contains("line 2"), "{err}");
        assert!(err.contains(">>>"));
    }

    #[test]
    fn test_zone_without_trailing_dot_is_rejected() {
        let toml = MINIMAL.replace("zone = \"shop.example.\"", "zone = \"shop.example\"");
        let err = format!("{:#}", parse_fleetswap_toml_str(&toml).unwrap_err());
        assert!(err.contains("Invalid environment 'stage'"), "{err}");
    }

    #[test]
    fn test_qa_url_requires_index_placeholder() {
        let toml = MINIMAL.replace("www.qa{index}", "www.qa");
        assert!(parse_fleetswap_toml_str(&toml).is_err());
    }

    #[test]
    fn test_capacity_bounds_are_checked() {
        let toml = format!("{MINIMAL}min_size = 3\nmax_size = 2\n");
        let err = format!("{:#}", parse_fleetswap_toml_str(&toml).unwrap_err());
        assert!(err.contains("exceeds max_size"), "{err}");
    }

    #[test]
    fn test_parse_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{MINIMAL}").unwrap();

        let config = parse_fleetswap_toml(temp_file.path()).unwrap();
        assert!(config.environments.contains_key("stage"));
    }

    #[test]
    fn test_parse_nonexistent_file() {
        let result = parse_fleetswap_toml(Path::new("/nonexistent/path/fleetswap.toml"));
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }
}
