use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::models::{
    DenominatorKind, DenominatorPolicy, GroupDef, GroupTable, PendingPolicy, ReservedColumns,
};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnConfig {
    pub name: String,
    pub office: String,
    pub total_label: String,
    /// Extra numeric headers that are not courses (serial numbers and the like).
    pub reserved: Vec<String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            name: "Name".to_string(),
            office: "Office".to_string(),
            total_label: "Total Courses".to_string(),
            reserved: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub pending: PendingPolicy,
    pub denominator: DenominatorKind,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub columns: ColumnConfig,
    pub policy: PolicyConfig,
    pub default_group: String,
    /// Sanctioned headcount for the default group, if it reports officially.
    pub default_group_strength: Option<usize>,
    pub groups: Vec<GroupDef>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            columns: ColumnConfig::default(),
            policy: PolicyConfig::default(),
            default_group: "Unassigned".to_string(),
            default_group_strength: None,
            groups: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Reads the TOML file at `path`, or falls back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            tracing::debug!("no config file given, using defaults");
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            groups = config.groups.len(),
            "loaded config"
        );
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.default_group.trim().is_empty() {
            bail!("default_group must not be empty");
        }
        let mut names = HashSet::new();
        for group in &self.groups {
            if group.name.trim().is_empty() {
                bail!("group names must not be empty");
            }
            if !names.insert(group.name.as_str()) || group.name == self.default_group {
                bail!("duplicate group `{}`", group.name);
            }
        }
        Ok(())
    }

    pub fn reserved_columns(&self) -> ReservedColumns {
        let mut others = vec![self.columns.total_label.clone()];
        others.extend(self.columns.reserved.iter().cloned());
        ReservedColumns {
            name: self.columns.name.clone(),
            office: self.columns.office.clone(),
            others,
        }
    }

    pub fn group_table(&self) -> GroupTable {
        GroupTable {
            groups: self.groups.clone(),
            default_group: self.default_group.clone(),
        }
    }

    pub fn denominator_policy(&self) -> DenominatorPolicy {
        match self.policy.denominator {
            DenominatorKind::Observed => DenominatorPolicy::Observed,
            DenominatorKind::Sanctioned => {
                let mut strengths: BTreeMap<String, usize> = self
                    .groups
                    .iter()
                    .filter_map(|group| {
                        group
                            .sanctioned_strength
                            .map(|strength| (group.name.clone(), strength))
                    })
                    .collect();
                if let Some(strength) = self.default_group_strength {
                    strengths.insert(self.default_group.clone(), strength);
                }
                DenominatorPolicy::Sanctioned(strengths)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
default_group = "Other Offices"
default_group_strength = 5

[columns]
name = "Name of the Employee"
office = "Office of Working"
reserved = ["S.No"]

[policy]
pending = "flag-is-completed-count"
denominator = "sanctioned"

[[groups]]
name = "Nellore Unit"
offices = ["Nellore", "Kavali"]
sanctioned_strength = 40

[[groups]]
name = "Tirupati Unit"
offices = ["Tirupati"]
"#;

    #[test]
    fn parses_full_config() {
        let config = EngineConfig::from_toml(SAMPLE).unwrap();

        assert_eq!(config.columns.name, "Name of the Employee");
        assert_eq!(config.columns.total_label, "Total Courses");
        assert_eq!(config.policy.pending, PendingPolicy::FlagIsCompletedCount);
        assert_eq!(config.groups.len(), 2);

        let reserved = config.reserved_columns();
        assert!(reserved.contains("S.No"));
        assert!(reserved.contains("Total Courses"));

        let DenominatorPolicy::Sanctioned(strengths) = config.denominator_policy() else {
            panic!("expected sanctioned policy");
        };
        assert_eq!(strengths.get("Nellore Unit"), Some(&40));
        assert_eq!(strengths.get("Other Offices"), Some(&5));
        assert_eq!(strengths.get("Tirupati Unit"), None);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.denominator_policy(), DenominatorPolicy::Observed);
    }

    #[test]
    fn rejects_duplicate_groups() {
        let err = EngineConfig::from_toml(
            r#"
[[groups]]
name = "Nellore Unit"

[[groups]]
name = "Nellore Unit"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate group"));
    }

    #[test]
    fn rejects_misspelled_keys() {
        let err = EngineConfig::from_toml("[policy]\ndenominater = \"sanctioned\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("denominater"));
        assert!(EngineConfig::from_toml("defualt_group = \"Other\"\n").is_err());
        assert!(EngineConfig::from_toml(
            "[[groups]]\nname = \"Nellore Unit\"\nsanctioned_strenght = 4\n"
        )
        .is_err());
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!(EngineConfig::from_toml("[policy]\npending = \"guess\"\n").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.default_group, "Other Offices");
        assert_eq!(EngineConfig::load(None).unwrap(), EngineConfig::default());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = EngineConfig::load(Some(Path::new("/nonexistent/completion.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/completion.toml"));
    }
}
