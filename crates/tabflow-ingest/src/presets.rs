//! Built-in pipeline definitions
//!
//! Each preset is a regular pipeline file compiled into the binary, so
//! `tabflow presets <name>` prints a starting point for a custom pipeline.

use crate::config::{ConfigError, PipelineConfig};

const BANKS: &str = include_str!("../pipelines/banks.toml");
const VEHICLES: &str = include_str!("../pipelines/vehicles.toml");
const FILMS: &str = include_str!("../pipelines/films.toml");

/// Preset names, in listing order
pub const NAMES: &[&str] = &["banks", "vehicles", "films"];

/// TOML text of a preset.
pub fn source(name: &str) -> Result<&'static str, ConfigError> {
    match name {
        "banks" => Ok(BANKS),
        "vehicles" => Ok(VEHICLES),
        "films" => Ok(FILMS),
        other => Err(ConfigError::UnknownPreset(other.to_string())),
    }
}

pub fn load(name: &str) -> Result<PipelineConfig, ConfigError> {
    PipelineConfig::from_toml_str(source(name)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::source::SourceFormat;
    use crate::transform::TransformStep;

    #[test]
    fn test_every_preset_validates() {
        for name in NAMES {
            let config = load(name).unwrap();
            assert_eq!(config.name, *name);
            config.validate().unwrap();
        }
    }

    #[test]
    fn test_banks_preset() {
        let config = load("banks").unwrap();
        assert_eq!(config.target_schema.columns(), &["Name", "MC_USD_Billion"]);
        assert_eq!(config.queries.len(), 3);
        assert_eq!(config.output.table.as_deref(), Some("Largest_banks"));

        let targets: Vec<_> = config
            .transforms
            .iter()
            .filter_map(|step| match step {
                TransformStep::ConvertCurrency { target, .. } => Some(target.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(targets, vec!["MC_GBP_Billion", "MC_EUR_Billion", "MC_INR_Billion"]);
    }

    #[test]
    fn test_films_preset_caps_rows() {
        let config = load("films").unwrap();
        match &config.sources[0].format {
            SourceFormat::HtmlTable(spec) => assert_eq!(spec.row_limit, Some(25)),
            other => panic!("unexpected format {:?}", other),
        }
        assert!(matches!(
            config.transforms[0],
            TransformStep::FilterRange { min: Some(lo), max: Some(hi), .. }
                if lo == 2000.0 && hi == 2009.0
        ));
    }

    #[test]
    fn test_vehicles_preset_discovers_xml() {
        let config = load("vehicles").unwrap();
        let discover = config.discover.unwrap();
        assert_eq!(discover.xml.unwrap().record_tag, "record");
        assert_eq!(discover.exclude, vec!["transformed_data.csv"]);
    }

    #[test]
    fn test_unknown_preset() {
        assert!(matches!(load("weather"), Err(ConfigError::UnknownPreset(_))));
    }
}
