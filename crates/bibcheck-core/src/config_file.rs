use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Config;
use crate::revise::RevisableField;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub dblp: Option<DblpConfig>,
    pub ai: Option<AiConfig>,
    pub ranking: Option<RankingConfig>,
    pub validation: Option<ValidationConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DblpConfig {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_hits: Option<usize>,
    pub requests_per_second: Option<u32>,
    pub fetch_full_records: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    pub service: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub fields: Option<Vec<String>>,
    pub max_length_ratio: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    pub title_weight: Option<f64>,
    pub author_weight: Option<f64>,
    pub min_score: Option<f64>,
    pub max_candidates: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub suppress_type: Option<bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config value: {0}")]
    Value(String),
}

/// Platform config directory path: `<config_dir>/bib-check/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bib-check").join("config.toml"))
}

/// Load config by cascading CWD `.bib-check.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".bib-check.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    match load_explicit(path) {
        Ok(config) => Some(config),
        Err(ConfigError::Io { .. }) => None,
        Err(e) => {
            tracing::warn!("ignoring {}", e);
            None
        }
    }
}

/// Load a config the user named explicitly; unlike [`load_from_path`] every
/// failure is an error.
pub fn load_explicit(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let dblp = match (base.dblp, overlay.dblp) {
        (Some(b), Some(o)) => Some(DblpConfig {
            base_url: o.base_url.or(b.base_url),
            timeout_secs: o.timeout_secs.or(b.timeout_secs),
            max_hits: o.max_hits.or(b.max_hits),
            requests_per_second: o.requests_per_second.or(b.requests_per_second),
            fetch_full_records: o.fetch_full_records.or(b.fetch_full_records),
        }),
        (b, o) => o.or(b),
    };
    let ai = match (base.ai, overlay.ai) {
        (Some(b), Some(o)) => Some(AiConfig {
            service: o.service.or(b.service),
            model: o.model.or(b.model),
            base_url: o.base_url.or(b.base_url),
            api_key: o.api_key.or(b.api_key),
            timeout_secs: o.timeout_secs.or(b.timeout_secs),
            fields: o.fields.or(b.fields),
            max_length_ratio: o.max_length_ratio.or(b.max_length_ratio),
        }),
        (b, o) => o.or(b),
    };
    let ranking = match (base.ranking, overlay.ranking) {
        (Some(b), Some(o)) => Some(RankingConfig {
            title_weight: o.title_weight.or(b.title_weight),
            author_weight: o.author_weight.or(b.author_weight),
            min_score: o.min_score.or(b.min_score),
            max_candidates: o.max_candidates.or(b.max_candidates),
        }),
        (b, o) => o.or(b),
    };
    let validation = match (base.validation, overlay.validation) {
        (Some(b), Some(o)) => Some(ValidationConfig {
            suppress_type: o.suppress_type.or(b.suppress_type),
        }),
        (b, o) => o.or(b),
    };

    ConfigFile {
        dblp,
        ai,
        ranking,
        validation,
    }
}

impl ConfigFile {
    /// Write every value this file sets onto `config`.
    pub fn apply(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(dblp) = &self.dblp {
            if let Some(url) = &dblp.base_url {
                config.dblp.base_url = url.clone();
            }
            if let Some(secs) = dblp.timeout_secs {
                config.dblp.timeout_secs = secs;
            }
            if let Some(hits) = dblp.max_hits {
                config.dblp.max_hits = hits;
            }
            if let Some(rps) = dblp.requests_per_second {
                if rps == 0 {
                    return Err(ConfigError::Value(
                        "dblp.requests_per_second must be at least 1".into(),
                    ));
                }
                config.dblp.requests_per_second = rps;
            }
            if let Some(fetch) = dblp.fetch_full_records {
                config.fetch_full_records = fetch;
            }
        }

        if let Some(ai) = &self.ai {
            if let Some(service) = &ai.service {
                config.ai.service = service.clone();
            }
            if let Some(model) = &ai.model {
                config.ai.model = model.clone();
            }
            if ai.base_url.is_some() {
                config.ai.base_url = ai.base_url.clone();
            }
            if ai.api_key.is_some() {
                config.ai.api_key = ai.api_key.clone();
            }
            if let Some(secs) = ai.timeout_secs {
                config.ai.timeout_secs = secs;
            }
            if let Some(fields) = &ai.fields {
                config.revision.fields = fields
                    .iter()
                    .map(|f| f.parse::<RevisableField>())
                    .collect::<Result<_, _>>()
                    .map_err(ConfigError::Value)?;
            }
            if let Some(ratio) = ai.max_length_ratio {
                if ratio < 1.0 {
                    return Err(ConfigError::Value(
                        "ai.max_length_ratio must be at least 1.0".into(),
                    ));
                }
                config.revision.max_length_ratio = ratio;
            }
        }

        if let Some(ranking) = &self.ranking {
            if let Some(w) = ranking.title_weight {
                config.ranking.title_weight = w;
            }
            if let Some(w) = ranking.author_weight {
                config.ranking.author_weight = w;
            }
            if let Some(s) = ranking.min_score {
                config.ranking.min_score = s;
            }
            if let Some(n) = ranking.max_candidates {
                config.ranking.max_candidates = n;
            }
        }

        if let Some(suppress) = self.validation.as_ref().and_then(|v| v.suppress_type) {
            config.suppress_type = suppress;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_sections_deserialize() {
        let parsed: ConfigFile =
            toml::from_str("[dblp]\nmax_hits = 20\n\n[validation]\nsuppress_type = true\n").unwrap();
        assert_eq!(parsed.dblp.as_ref().unwrap().max_hits, Some(20));
        assert!(parsed.dblp.unwrap().base_url.is_none());
        assert!(parsed.ai.is_none());
        assert_eq!(parsed.validation.unwrap().suppress_type, Some(true));
    }

    #[test]
    fn merge_overlay_wins_per_field() {
        let base = ConfigFile {
            ai: Some(AiConfig {
                service: Some("deepseek".into()),
                model: Some("deepseek-chat".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            ai: Some(AiConfig {
                service: Some("openai".into()),
                ..Default::default()
            }),
            ranking: Some(RankingConfig {
                min_score: Some(0.9),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        let ai = merged.ai.unwrap();
        assert_eq!(ai.service.as_deref(), Some("openai"));
        assert_eq!(ai.model.as_deref(), Some("deepseek-chat"));
        assert_eq!(merged.ranking.unwrap().min_score, Some(0.9));
        assert!(merged.dblp.is_none());
    }

    #[test]
    fn apply_sets_runtime_values() {
        let file: ConfigFile = toml::from_str(
            "[dblp]\nfetch_full_records = false\nrequests_per_second = 2\n\n[ai]\nfields = [\"title\"]\ntimeout_secs = 15\n\n[ranking]\nmax_candidates = 3\n",
        )
        .unwrap();
        let mut config = Config::default();
        file.apply(&mut config).unwrap();
        assert!(!config.fetch_full_records);
        assert_eq!(config.dblp.requests_per_second, 2);
        assert_eq!(config.revision.fields, vec![RevisableField::Title]);
        assert_eq!(config.ai.timeout_secs, 15);
        assert_eq!(config.ranking.max_candidates, 3);
    }

    #[test]
    fn apply_rejects_bad_values() {
        let file: ConfigFile = toml::from_str("[ai]\nfields = [\"author\"]\n").unwrap();
        assert!(matches!(
            file.apply(&mut Config::default()),
            Err(ConfigError::Value(_))
        ));
        let file: ConfigFile = toml::from_str("[dblp]\nrequests_per_second = 0\n").unwrap();
        assert!(file.apply(&mut Config::default()).is_err());
    }

    #[test]
    fn explicit_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[dblp\n").unwrap();
        assert!(matches!(load_explicit(&path), Err(ConfigError::Parse { .. })));
        assert!(load_from_path(&path).is_none());
        assert!(matches!(
            load_explicit(&dir.path().join("absent.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
