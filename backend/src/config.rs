//! Runtime configuration loaded via OrthoConfig.
//!
//! Every value may come from `FOOD_ACCESS_*` environment variables, a
//! configuration file or the command line. Unset values fall back to the
//! defaults documented on each accessor.

use std::str::FromStr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

use crate::domain::geometry::DistanceMetric;
use crate::domain::{AnalysisSettings, DedupPolicy, Error, FootprintPolicy, IngestionSettings};
use crate::outbound::overpass::OverpassHttpIdentity;

/// Public Overpass interpreter used when no endpoint is configured.
pub const DEFAULT_OVERPASS_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// Food-access engine settings.
#[derive(Debug, Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "FOOD_ACCESS")]
pub struct FoodAccessSettings {
    /// PostGIS connection URL. In-memory repositories are used when unset.
    pub database_url: Option<String>,
    /// Overpass interpreter endpoint.
    pub overpass_endpoint: Option<String>,
    /// Upper bound on one upstream fetch, seconds.
    pub fetch_timeout_secs: Option<u64>,
    /// `external_id` or `name_location_boundary`.
    pub dedup_policy: Option<String>,
    /// `centroid` or `discard`.
    pub footprint_policy: Option<String>,
    /// `geodesic` or `legacy_degrees`.
    pub distance_metric: Option<String>,
    /// Walking distance used for coverage, metres.
    pub walk_radius_meters: Option<f64>,
    /// Default counting radius for point analysis, km.
    pub search_radius_km: Option<f64>,
    /// Candidate radius when no region is loaded, km.
    pub nearest_search_radius_km: Option<f64>,
    /// User-agent sent to Overpass.
    pub user_agent: Option<String>,
    /// Contact header sent to Overpass.
    pub contact: Option<String>,
}

impl FoodAccessSettings {
    /// Configured database URL, ignoring blank values.
    pub fn database_url(&self) -> Option<&str> {
        self.database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Overpass endpoint, defaulting to [`DEFAULT_OVERPASS_ENDPOINT`].
    ///
    /// # Errors
    ///
    /// Returns a validation error when the configured value is not a URL.
    pub fn overpass_endpoint(&self) -> Result<Url, Error> {
        let raw = self
            .overpass_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_OVERPASS_ENDPOINT);
        Url::parse(raw)
            .map_err(|err| Error::validation(format!("invalid overpass endpoint '{raw}': {err}")))
    }

    /// Fetch timeout, defaulting to three minutes.
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout_secs
            .filter(|secs| *secs > 0)
            .map_or(crate::domain::ingestion::DEFAULT_FETCH_TIMEOUT, Duration::from_secs)
    }

    /// Outbound identity for the Overpass adapter.
    pub fn overpass_identity(&self) -> OverpassHttpIdentity {
        let defaults = OverpassHttpIdentity::default();
        OverpassHttpIdentity {
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            contact: self.contact.clone().unwrap_or(defaults.contact),
            query_timeout_seconds: u32::try_from(self.fetch_timeout().as_secs())
                .unwrap_or(u32::MAX),
        }
    }

    /// Ingestion pipeline settings.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown policy names.
    pub fn ingestion_settings(&self) -> Result<IngestionSettings, Error> {
        Ok(IngestionSettings {
            dedup_policy: parse_or_default::<DedupPolicy>(self.dedup_policy.as_deref())?,
            footprint_policy: parse_or_default::<FootprintPolicy>(
                self.footprint_policy.as_deref(),
            )?,
            fetch_timeout: self.fetch_timeout(),
        })
    }

    /// Analysis settings.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown metric or a radius that is
    /// not positive and finite.
    pub fn analysis_settings(&self) -> Result<AnalysisSettings, Error> {
        let defaults = AnalysisSettings::default();
        Ok(AnalysisSettings {
            walk_radius_meters: positive(
                "walk_radius_meters",
                self.walk_radius_meters,
                defaults.walk_radius_meters,
            )?,
            search_radius_km: positive(
                "search_radius_km",
                self.search_radius_km,
                defaults.search_radius_km,
            )?,
            nearest_search_radius_km: positive(
                "nearest_search_radius_km",
                self.nearest_search_radius_km,
                defaults.nearest_search_radius_km,
            )?,
            distance_metric: parse_or_default::<DistanceMetric>(self.distance_metric.as_deref())?,
        })
    }
}

fn parse_or_default<T>(raw: Option<&str>) -> Result<T, Error>
where
    T: FromStr<Err = String> + Default,
{
    raw.map_or_else(|| Ok(T::default()), |value| T::from_str(value.trim()))
        .map_err(Error::validation)
}

fn positive(name: &str, value: Option<f64>, default: f64) -> Result<f64, Error> {
    match value {
        None => Ok(default),
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(v) => Err(Error::validation(format!(
            "{name} must be positive and finite, got {v}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    //! Configuration loading and conversion coverage.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    use crate::domain::ErrorCode;

    const VARS: [&str; 6] = [
        "FOOD_ACCESS_DATABASE_URL",
        "FOOD_ACCESS_DEDUP_POLICY",
        "FOOD_ACCESS_DISTANCE_METRIC",
        "FOOD_ACCESS_FETCH_TIMEOUT_SECS",
        "FOOD_ACCESS_WALK_RADIUS_METERS",
        "FOOD_ACCESS_OVERPASS_ENDPOINT",
    ];

    fn load_from_empty_args() -> FoodAccessSettings {
        FoodAccessSettings::load_from_iter([OsString::from("food-access")])
            .expect("config should load")
    }

    #[rstest]
    fn defaults_apply_when_unset() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();
        assert!(settings.database_url().is_none());
        assert_eq!(
            settings.overpass_endpoint().expect("default endpoint").as_str(),
            DEFAULT_OVERPASS_ENDPOINT
        );
        assert_eq!(
            settings.ingestion_settings().expect("defaults"),
            IngestionSettings::default()
        );
        assert_eq!(
            settings.analysis_settings().expect("defaults"),
            AnalysisSettings::default()
        );
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("FOOD_ACCESS_DATABASE_URL", Some("postgres://db/food".to_owned())),
            ("FOOD_ACCESS_DEDUP_POLICY", Some("name_location_boundary".to_owned())),
            ("FOOD_ACCESS_DISTANCE_METRIC", Some("legacy_degrees".to_owned())),
            ("FOOD_ACCESS_FETCH_TIMEOUT_SECS", Some("30".to_owned())),
            ("FOOD_ACCESS_WALK_RADIUS_METERS", Some("800".to_owned())),
            ("FOOD_ACCESS_OVERPASS_ENDPOINT", None),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(settings.database_url(), Some("postgres://db/food"));
        let ingestion = settings.ingestion_settings().expect("valid");
        assert_eq!(ingestion.dedup_policy, DedupPolicy::NameLocationBoundary);
        assert_eq!(ingestion.fetch_timeout, Duration::from_secs(30));
        let analysis = settings.analysis_settings().expect("valid");
        assert_eq!(analysis.distance_metric, DistanceMetric::LegacyDegrees);
        assert_eq!(analysis.walk_radius_meters, 800.0);
        assert_eq!(settings.overpass_identity().query_timeout_seconds, 30);
    }

    #[rstest]
    fn unknown_policy_is_a_validation_error() {
        let settings = FoodAccessSettings {
            dedup_policy: Some("by_colour".to_owned()),
            ..FoodAccessSettings::default()
        };
        let error = settings.ingestion_settings().expect_err("unknown policy");
        assert_eq!(error.code(), ErrorCode::Validation);
    }

    #[rstest]
    #[case(Some(0.0))]
    #[case(Some(-1.0))]
    #[case(Some(f64::INFINITY))]
    fn non_positive_radius_is_rejected(#[case] radius: Option<f64>) {
        let settings = FoodAccessSettings {
            search_radius_km: radius,
            ..FoodAccessSettings::default()
        };
        assert!(settings.analysis_settings().is_err());
    }

    #[rstest]
    fn blank_database_url_means_in_memory() {
        let settings = FoodAccessSettings {
            database_url: Some("   ".to_owned()),
            ..FoodAccessSettings::default()
        };
        assert!(settings.database_url().is_none());
    }
}
