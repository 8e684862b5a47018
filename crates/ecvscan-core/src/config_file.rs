use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_TRUNCATE_DEPTH: usize = 2;
pub const DEFAULT_CROSSREF_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PROJECT_ACRONYMS: &[&str] = &["ghg", "reccap-2", "cmug", "ar5", "sst"];

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub scan: Option<ScanSection>,
    pub sections: Option<SectionsSection>,
    pub crossref: Option<CrossrefSection>,
    pub projects: Option<ProjectsSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSection {
    /// Ordered tag list. Takes precedence over `preset` (`ar6`, `ars`).
    pub tags: Option<Vec<String>>,
    pub preset: Option<String>,
    pub extension: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionsSection {
    pub header_pattern: Option<String>,
    pub truncate_depth: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrossrefSection {
    pub mailto: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectsSection {
    pub acronyms: Option<Vec<String>>,
}

impl ConfigFile {
    /// Tag list: explicit `tags` first, then the named preset.
    pub fn tags(&self) -> Option<Vec<String>> {
        let scan = self.scan.as_ref()?;
        scan.tags
            .clone()
            .or_else(|| scan.preset.as_deref().and_then(crate::tags::preset))
    }

    pub fn extension(&self) -> String {
        self.scan
            .as_ref()
            .and_then(|s| s.extension.clone())
            .unwrap_or_else(|| "txt".to_string())
    }

    pub fn header_pattern(&self) -> Option<&str> {
        self.sections.as_ref()?.header_pattern.as_deref()
    }

    pub fn truncate_depth(&self) -> usize {
        self.sections
            .as_ref()
            .and_then(|s| s.truncate_depth)
            .unwrap_or(DEFAULT_TRUNCATE_DEPTH)
    }

    pub fn crossref_mailto(&self) -> Option<&str> {
        self.crossref.as_ref()?.mailto.as_deref()
    }

    pub fn crossref_base_url(&self) -> Option<&str> {
        self.crossref.as_ref()?.base_url.as_deref()
    }

    pub fn crossref_timeout_secs(&self) -> u64 {
        self.crossref
            .as_ref()
            .and_then(|c| c.timeout_secs)
            .unwrap_or(DEFAULT_CROSSREF_TIMEOUT_SECS)
    }

    pub fn project_acronyms(&self) -> Vec<String> {
        self.projects
            .as_ref()
            .and_then(|p| p.acronyms.clone())
            .unwrap_or_else(|| {
                DEFAULT_PROJECT_ACRONYMS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            })
    }
}

/// Platform config directory path: `<config_dir>/ecvscan/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ecvscan").join("config.toml"))
}

/// Load config by cascading CWD `.ecvscan.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".ecvscan.toml"));

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
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        scan: Some(ScanSection {
            tags: overlay
                .scan
                .as_ref()
                .and_then(|s| s.tags.clone())
                .or_else(|| base.scan.as_ref().and_then(|s| s.tags.clone())),
            preset: overlay
                .scan
                .as_ref()
                .and_then(|s| s.preset.clone())
                .or_else(|| base.scan.as_ref().and_then(|s| s.preset.clone())),
            extension: overlay
                .scan
                .as_ref()
                .and_then(|s| s.extension.clone())
                .or_else(|| base.scan.as_ref().and_then(|s| s.extension.clone())),
        }),
        sections: Some(SectionsSection {
            header_pattern: overlay
                .sections
                .as_ref()
                .and_then(|s| s.header_pattern.clone())
                .or_else(|| {
                    base.sections
                        .as_ref()
                        .and_then(|s| s.header_pattern.clone())
                }),
            truncate_depth: overlay
                .sections
                .as_ref()
                .and_then(|s| s.truncate_depth)
                .or_else(|| base.sections.as_ref().and_then(|s| s.truncate_depth)),
        }),
        crossref: Some(CrossrefSection {
            mailto: overlay
                .crossref
                .as_ref()
                .and_then(|c| c.mailto.clone())
                .or_else(|| base.crossref.as_ref().and_then(|c| c.mailto.clone())),
            base_url: overlay
                .crossref
                .as_ref()
                .and_then(|c| c.base_url.clone())
                .or_else(|| base.crossref.as_ref().and_then(|c| c.base_url.clone())),
            timeout_secs: overlay
                .crossref
                .as_ref()
                .and_then(|c| c.timeout_secs)
                .or_else(|| base.crossref.as_ref().and_then(|c| c.timeout_secs)),
        }),
        projects: Some(ProjectsSection {
            acronyms: overlay
                .projects
                .as_ref()
                .and_then(|p| p.acronyms.clone())
                .or_else(|| base.projects.as_ref().and_then(|p| p.acronyms.clone())),
        }),
    }
}
