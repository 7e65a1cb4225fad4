//! The ordered table of file-format eras.
//!
//! Every entry pairs a converter module with the formats it produces and the
//! releases that wrote them. The table is checked once, the first time it is
//! used; a conversion never starts on an inconsistent table.

use crate::modules;
use crate::step::{ConverterModule, Direction};
use lyx2lyx_common::{ConvertError, ConvertResult};
use once_cell::sync::Lazy;
use std::ops::RangeInclusive;
use tracing::debug;

/// One era of the file format.
#[derive(Debug)]
pub struct FormatRelation {
    pub module: &'static ConverterModule,
    pub formats: RangeInclusive<u32>,
    pub versions: &'static [&'static str],
}

impl FormatRelation {
    pub fn first_format(&self) -> u32 {
        *self.formats.start()
    }

    pub fn last_format(&self) -> u32 {
        *self.formats.end()
    }

    pub fn has_format(&self, format: u32) -> bool {
        self.formats.contains(&format)
    }

    pub fn has_version(&self, version: &str) -> bool {
        self.versions.contains(&version)
    }

    pub fn name(&self) -> &'static str {
        self.module.name
    }
}

static FORMAT_RELATION: [FormatRelation; 13] = [
    FormatRelation {
        module: &modules::lyx_0_06::MODULE,
        formats: 200..=200,
        versions: &["0.6", "0.6.0", "0.6.1", "0.6.2", "0.6.3", "0.6.4"],
    },
    FormatRelation {
        module: &modules::lyx_0_08::MODULE,
        formats: 210..=210,
        versions: &["0.8", "0.8.0", "0.8.1", "0.8.2", "0.8.3", "0.8.4", "0.8.5", "0.8.6", "0.7"],
    },
    FormatRelation {
        module: &modules::lyx_0_10::MODULE,
        formats: 210..=210,
        versions: &[
            "0.10", "0.10.0", "0.10.1", "0.10.2", "0.10.3", "0.10.4", "0.10.5", "0.10.6",
            "0.10.7", "0.9", "0.9.0", "0.9.1", "0.9.2", "0.9.3",
        ],
    },
    FormatRelation {
        module: &modules::lyx_0_12::MODULE,
        formats: 215..=215,
        versions: &["0.12", "0.12.0", "0.12.1", "0.11"],
    },
    FormatRelation {
        module: &modules::lyx_1_0::MODULE,
        formats: 215..=215,
        versions: &["1.0", "1.0.0", "1.0.1", "1.0.2", "1.0.3", "1.0.4"],
    },
    FormatRelation {
        module: &modules::lyx_1_1::MODULE,
        formats: 215..=215,
        versions: &["1.1", "1.1.0", "1.1.1", "1.1.2", "1.1.3", "1.1.4"],
    },
    FormatRelation {
        module: &modules::lyx_1_1_5::MODULE,
        formats: 216..=216,
        versions: &["1.1", "1.1.5", "1.1.5fix1", "1.1.5fix2", "1.1.6"],
    },
    FormatRelation {
        module: &modules::lyx_1_1_6_0::MODULE,
        formats: 217..=217,
        versions: &["1.1", "1.1.6", "1.1.6fix1", "1.1.6fix2"],
    },
    FormatRelation {
        module: &modules::lyx_1_1_6_3::MODULE,
        formats: 218..=218,
        versions: &["1.1", "1.1.6fix3", "1.1.6fix4"],
    },
    FormatRelation {
        module: &modules::lyx_1_2::MODULE,
        formats: 220..=220,
        versions: &["1.2", "1.2.0", "1.2.1", "1.2.2", "1.2.3", "1.2.4"],
    },
    FormatRelation {
        module: &modules::lyx_1_3::MODULE,
        formats: 221..=221,
        versions: &[
            "1.3", "1.3.0", "1.3.1", "1.3.2", "1.3.3", "1.3.4", "1.3.5", "1.3.6", "1.3.7",
        ],
    },
    FormatRelation {
        module: &modules::lyx_1_4::MODULE,
        formats: 222..=245,
        versions: &["1.4", "1.4.0", "1.4.1", "1.4.2", "1.4.3", "1.4.4", "1.4.5"],
    },
    FormatRelation {
        module: &modules::lyx_1_5::MODULE,
        formats: 246..=276,
        versions: &["1.5", "1.5.0", "1.5.1", "1.5.2", "1.5.3", "1.5.4", "1.5.5", "1.5.6", "1.5.7"],
    },
];

static REGISTRY: Lazy<Result<Registry, String>> = Lazy::new(|| Registry::new(&FORMAT_RELATION));

/// The validated built-in registry.
pub fn registry() -> ConvertResult<&'static Registry> {
    REGISTRY
        .as_ref()
        .map_err(|message| ConvertError::Registry(message.clone()))
}

/// The modules to run, in order, to move a document between two positions.
#[derive(Debug)]
pub struct Chain {
    pub direction: Direction,
    pub relations: Vec<&'static FormatRelation>,
    /// The declared source release did not identify a unique entry.
    pub version_mismatch: bool,
}

impl Chain {
    pub fn module_names(&self) -> Vec<&'static str> {
        self.relations.iter().map(|r| r.name()).collect()
    }
}

pub struct Registry {
    relations: &'static [FormatRelation],
}

impl Registry {
    /// Check a table and wrap it.
    ///
    /// Entries must be ordered by format with no overlap except a single
    /// format shared by consecutive single-format entries. Each module's
    /// convert steps must produce exactly the formats of its entry, and a
    /// non-empty revert list must step down one format at a time to the last
    /// format of the previous entry.
    pub fn new(relations: &'static [FormatRelation]) -> Result<Self, String> {
        if relations.is_empty() {
            return Err("no formats registered".to_string());
        }

        for (i, relation) in relations.iter().enumerate() {
            let name = relation.name();
            if relation.formats.is_empty() {
                return Err(format!("module {} has an empty format range", name));
            }
            if relation.versions.is_empty() {
                return Err(format!("module {} lists no releases", name));
            }
            if relations[..i].iter().any(|r| r.name() == name) {
                return Err(format!("module {} is registered twice", name));
            }

            let previous = i.checked_sub(1).map(|p| &relations[p]);
            if let Some(previous) = previous {
                let shared = relation.first_format() == previous.last_format()
                    && relation.first_format() == relation.last_format()
                    && previous.first_format() == previous.last_format();
                if relation.first_format() <= previous.last_format() && !shared {
                    return Err(format!(
                        "module {} overlaps the formats of module {}",
                        name,
                        previous.name()
                    ));
                }
            }

            let converts: Vec<u32> = relation.module.convert.iter().map(|s| s.format).collect();
            let expected: Vec<u32> = relation.formats.clone().collect();
            if converts != expected {
                return Err(format!(
                    "convert steps of module {} produce {:?}, expected {:?}",
                    name, converts, expected
                ));
            }

            if !relation.module.revert.is_empty() {
                let Some(previous) = previous else {
                    return Err(format!("module {} reverts past the oldest format", name));
                };
                let reverts: Vec<u32> = relation.module.revert.iter().map(|s| s.format).collect();
                let mut expected: Vec<u32> =
                    (relation.first_format()..relation.last_format()).rev().collect();
                if previous.last_format() < relation.first_format() {
                    expected.push(previous.last_format());
                }
                if reverts != expected {
                    return Err(format!(
                        "revert steps of module {} produce {:?}, expected {:?}",
                        name, reverts, expected
                    ));
                }
            }
        }

        Ok(Self { relations })
    }

    pub fn relations(&self) -> &'static [FormatRelation] {
        self.relations
    }

    pub fn latest_format(&self) -> u32 {
        self.relations.last().map(|r| r.last_format()).unwrap_or_default()
    }

    /// Every known format, ascending and without repeats.
    pub fn formats(&self) -> Vec<u32> {
        let mut formats: Vec<u32> = self
            .relations
            .iter()
            .flat_map(|r| r.formats.clone())
            .collect();
        formats.dedup();
        formats
    }

    pub fn supports(&self, format: u32) -> bool {
        self.position_of(format).is_some()
    }

    /// First entry that contains `format`.
    pub fn position_of(&self, format: u32) -> Option<usize> {
        self.relations.iter().position(|r| r.has_format(format))
    }

    /// Entry that contains `format` and lists `version`.
    pub fn position_of_version(&self, format: u32, version: &str) -> Option<usize> {
        self.relations
            .iter()
            .position(|r| r.has_format(format) && r.has_version(version))
    }

    /// Newest format written by `version`.
    pub fn format_of_version(&self, version: &str) -> Option<u32> {
        self.relations
            .iter()
            .rev()
            .find(|r| r.has_version(version))
            .map(|r| r.last_format())
    }

    pub fn version_has_format(&self, version: &str, format: u32) -> bool {
        self.position_of_version(format, version).is_some()
    }

    /// Newest release that wrote `format`.
    pub fn default_version(&self, format: u32) -> Option<&'static str> {
        self.relations
            .iter()
            .rev()
            .find(|r| r.has_format(format))
            .and_then(|r| r.versions.last().copied())
    }

    /// True when more than one entry claims `format`.
    pub fn is_shared(&self, format: u32) -> bool {
        self.relations.iter().filter(|r| r.has_format(format)).count() > 1
    }

    /// Modules to run to take a document from `format` (written by
    /// `initial_version`) to `end_format` (as written by `final_version`).
    pub fn chain(
        &self,
        format: u32,
        initial_version: Option<&str>,
        end_format: u32,
        final_version: Option<&str>,
    ) -> ConvertResult<Chain> {
        let by_version = initial_version.and_then(|v| self.position_of_version(format, v));
        let (initial, version_mismatch) = match by_version {
            Some(position) => (position, false),
            None => {
                let position = self
                    .position_of(format)
                    .ok_or(ConvertError::UnsupportedFormat(format))?;
                let mismatch = initial_version.is_some() || self.is_shared(format);
                (position, mismatch)
            }
        };

        let target = final_version
            .and_then(|v| self.position_of_version(end_format, v))
            .or_else(|| self.position_of(end_format))
            .ok_or(ConvertError::UnsupportedFormat(end_format))?;

        let (direction, relations) = if (initial, format) < (target, end_format) {
            let mut relations: Vec<_> = self.relations[initial..=target].iter().collect();
            if self.relations[initial].last_format() == format {
                relations.remove(0);
            }
            (Direction::Convert, relations)
        } else {
            let mut relations: Vec<_> = self.relations[target..=initial].iter().rev().collect();
            if self.relations[target].last_format() == end_format {
                relations.pop();
            }
            (Direction::Revert, relations)
        };

        debug!(
            format,
            end_format,
            %direction,
            modules = ?relations.iter().map(|r| r.name()).collect::<Vec<_>>(),
            "Computed conversion chain"
        );

        Ok(Chain {
            direction,
            relations,
            version_mismatch,
        })
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("modules", &format!("{} modules", self.relations.len()))
            .field("latest_format", &self.latest_format())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Step;

    #[test]
    fn test_builtin_registry_is_valid() {
        let registry = registry().unwrap();
        assert_eq!(registry.latest_format(), 276);
        assert_eq!(registry.relations().len(), 13);
    }

    #[test]
    fn test_formats_list() {
        let formats = registry().unwrap().formats();
        assert_eq!(&formats[..9], &[200, 210, 215, 216, 217, 218, 220, 221, 222]);
        assert_eq!(formats.last(), Some(&276));
        assert!(!formats.contains(&219));
    }

    #[test]
    fn test_format_of_version() {
        let registry = registry().unwrap();
        assert_eq!(registry.format_of_version("1.3.4"), Some(221));
        assert_eq!(registry.format_of_version("1.4"), Some(245));
        assert_eq!(registry.format_of_version("1.1"), Some(218));
        assert_eq!(registry.format_of_version("2.0"), None);
        assert_eq!(registry.default_version(276), Some("1.5.7"));
        assert_eq!(registry.default_version(215), Some("1.1.4"));
    }

    #[test]
    fn test_chain_convert_drops_finished_module() {
        let chain = registry().unwrap().chain(221, Some("1.3.4"), 276, None).unwrap();
        assert_eq!(chain.direction, Direction::Convert);
        assert_eq!(chain.module_names(), vec!["1_4", "1_5"]);
        assert!(!chain.version_mismatch);
    }

    #[test]
    fn test_chain_within_one_module() {
        let registry = registry().unwrap();
        let chain = registry.chain(230, None, 240, None).unwrap();
        assert_eq!(chain.module_names(), vec!["1_4"]);
        let chain = registry.chain(240, None, 230, None).unwrap();
        assert_eq!(chain.direction, Direction::Revert);
        assert_eq!(chain.module_names(), vec!["1_4"]);
    }

    #[test]
    fn test_chain_revert_drops_target_module() {
        let chain = registry().unwrap().chain(260, None, 245, None).unwrap();
        assert_eq!(chain.direction, Direction::Revert);
        assert_eq!(chain.module_names(), vec!["1_5"]);

        let chain = registry().unwrap().chain(245, None, 221, None).unwrap();
        assert_eq!(chain.module_names(), vec!["1_4"]);
    }

    #[test]
    fn test_chain_from_shared_format() {
        let registry = registry().unwrap();
        let chain = registry.chain(215, Some("1.0.2"), 276, None).unwrap();
        assert_eq!(chain.module_names()[0], "1_1");
        assert!(!chain.version_mismatch);

        let chain = registry.chain(215, None, 276, None).unwrap();
        assert_eq!(chain.module_names()[0], "1_0");
        assert!(chain.version_mismatch);

        let chain = registry.chain(210, Some("0.8.3"), 215, None).unwrap();
        assert_eq!(chain.module_names(), vec!["0_10", "0_12"]);
    }

    #[test]
    fn test_chain_declared_version_mismatch() {
        let chain = registry().unwrap().chain(275, Some("1.3"), 276, None).unwrap();
        assert!(chain.version_mismatch);
        assert_eq!(chain.module_names(), vec!["1_5"]);
    }

    #[test]
    fn test_chain_unknown_format() {
        let registry = registry().unwrap();
        assert!(matches!(
            registry.chain(219, None, 276, None),
            Err(ConvertError::UnsupportedFormat(219))
        ));
        assert!(matches!(
            registry.chain(221, None, 300, None),
            Err(ConvertError::UnsupportedFormat(300))
        ));
    }

    static EMPTY: &[Step] = &[];
    static ONE: ConverterModule = ConverterModule {
        name: "one",
        convert: &[Step { format: 1, rewrites: &[] }],
        revert: EMPTY,
    };
    static TWO: ConverterModule = ConverterModule {
        name: "two",
        convert: &[Step { format: 2, rewrites: &[] }, Step { format: 4, rewrites: &[] }],
        revert: EMPTY,
    };
    static THREE: ConverterModule = ConverterModule {
        name: "three",
        convert: &[Step { format: 2, rewrites: &[] }, Step { format: 3, rewrites: &[] }],
        revert: &[Step { format: 2, rewrites: &[] }],
    };
    static GAPPED: [FormatRelation; 2] = [
        FormatRelation { module: &ONE, formats: 1..=1, versions: &["1"] },
        FormatRelation { module: &TWO, formats: 2..=3, versions: &["2"] },
    ];
    static SHORT_REVERT: [FormatRelation; 2] = [
        FormatRelation { module: &ONE, formats: 1..=1, versions: &["1"] },
        FormatRelation { module: &THREE, formats: 2..=3, versions: &["2"] },
    ];
    static OVERLAP: [FormatRelation; 2] = [
        FormatRelation { module: &THREE, formats: 2..=3, versions: &["2"] },
        FormatRelation { module: &ONE, formats: 1..=1, versions: &["1"] },
    ];

    #[test]
    fn test_validation_rejects_convert_gap() {
        let err = Registry::new(&GAPPED).unwrap_err();
        assert!(err.contains("convert steps of module two"), "{}", err);
    }

    #[test]
    fn test_validation_rejects_short_revert() {
        let err = Registry::new(&SHORT_REVERT).unwrap_err();
        assert!(err.contains("revert steps of module three"), "{}", err);
    }

    #[test]
    fn test_validation_rejects_unordered_table() {
        let err = Registry::new(&OVERLAP).unwrap_err();
        assert!(err.contains("reverts past the oldest format") || err.contains("overlaps"), "{}", err);
    }
}
