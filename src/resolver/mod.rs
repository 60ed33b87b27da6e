mod index;

use std::collections::{BTreeSet, HashMap, VecDeque};

use log::{debug, warn};
use thiserror::Error;

use crate::model::{
    platform::{Platform, PlatformDescriptor, PlatformField},
    recipe::{
        resolved::Resolution, DependencySpec, OptionOverride, PackageName, Precedence, Recipe,
    },
};

/// Source of the requirements an upstream package declares for itself.
pub trait RequirementProvider {
    fn requirements(&self, package: &DependencySpec) -> Vec<DependencySpec>;
}

impl<T: RequirementProvider + ?Sized> RequirementProvider for &T {
    fn requirements(&self, package: &DependencySpec) -> Vec<DependencySpec> {
        (**self).requirements(package)
    }
}

/// A provider that knows of no upstream requirements.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUpstream;

impl RequirementProvider for NoUpstream {
    fn requirements(&self, _package: &DependencySpec) -> Vec<DependencySpec> {
        Vec::new()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Platform descriptor is missing the `{0}` setting")]
    MissingField(PlatformField),
    #[error("Version conflict for {name}: {existing} and {requested} are both required and neither is forced over the other")]
    Conflict {
        name: PackageName,
        existing: String,
        requested: String,
    },
}

/// Maps a platform descriptor to the dependency set and option overrides of
/// a recipe.
///
/// Resolution is a pure function of the descriptor: the recipe and the
/// provider are fixed at construction and never mutated.
pub struct Resolver<'a, P = NoUpstream> {
    recipe: &'a Recipe,
    provider: P,
}

impl<'a> Resolver<'a, NoUpstream> {
    pub fn new(recipe: &'a Recipe) -> Self {
        Resolver {
            recipe,
            provider: NoUpstream,
        }
    }
}

impl<'a, P> Resolver<'a, P>
where
    P: RequirementProvider,
{
    pub fn with_provider(recipe: &'a Recipe, provider: P) -> Self {
        Resolver { recipe, provider }
    }

    pub fn recipe(&self) -> &Recipe {
        self.recipe
    }

    pub fn resolve(&self, descriptor: &PlatformDescriptor) -> Result<Resolution, ResolveError> {
        let platform = descriptor.complete().map_err(ResolveError::MissingField)?;
        debug!("Resolving {} for {}", self.recipe.name, platform);

        let dependencies = self.dependencies()?;
        let options = self.options(&platform);

        for option in &options {
            if !dependencies.iter().any(|d| d.name == option.package) {
                warn!(
                    "Option {} targets {}, which is not a resolved dependency",
                    option, option.package
                );
            }
        }

        Ok(Resolution {
            dependencies,
            options,
        })
    }

    /// Direct requirements first, in declaration order, then the upstream
    /// requests breadth first. Superseded requests are not expanded.
    fn dependencies(&self) -> Result<Vec<DependencySpec>, ResolveError> {
        let mut merged = MergedRequirements::default();
        for requirement in &self.recipe.requires {
            merged.insert(requirement.clone())?;
        }

        let mut queue: VecDeque<DependencySpec> = merged.entries.iter().cloned().collect();
        let mut visited = BTreeSet::new();
        while let Some(package) = queue.pop_front() {
            if !visited.insert(package.to_string()) {
                continue;
            }
            for upstream in self.provider.requirements(&package) {
                let upstream = DependencySpec {
                    precedence: Precedence::Normal,
                    ..upstream
                };
                debug!("{} requires {}", package, upstream);
                if let Some(accepted) = merged.insert(upstream)? {
                    queue.push_back(accepted);
                }
            }
        }

        Ok(merged.entries)
    }

    fn options(&self, platform: &Platform) -> Vec<OptionOverride> {
        let mut options: Vec<OptionOverride> = Vec::new();
        let mut set = |option: &OptionOverride| {
            match options
                .iter_mut()
                .find(|o| o.targets(&option.package, &option.option))
            {
                Some(existing) => existing.value = option.value.clone(),
                None => options.push(option.clone()),
            }
        };

        self.recipe.options.iter().for_each(&mut set);

        for rule in &self.recipe.rules {
            if rule.condition.matches(platform) {
                debug!("Rule for {} matches {}", rule.condition, platform);
                rule.options.iter().for_each(&mut set);
            }
        }

        options
    }
}

/// Requirements deduplicated by name, kept at the position of first appearance.
#[derive(Default)]
struct MergedRequirements {
    entries: Vec<DependencySpec>,
    positions: HashMap<PackageName, usize>,
}

impl MergedRequirements {
    /// Returns the request if it became the entry for its name.
    fn insert(
        &mut self,
        requested: DependencySpec,
    ) -> Result<Option<DependencySpec>, ResolveError> {
        let Some(position) = self.positions.get(&requested.name).copied() else {
            self.positions
                .insert(requested.name.clone(), self.entries.len());
            self.entries.push(requested.clone());
            return Ok(Some(requested));
        };

        let existing = &mut self.entries[position];
        if existing.same_request(&requested) {
            existing.transitive_libs |= requested.transitive_libs;
            if requested.is_forced() {
                existing.precedence = Precedence::Force;
            }
            return Ok(None);
        }

        match (existing.precedence, requested.precedence) {
            (Precedence::Force, Precedence::Normal) => {
                debug!("{} overrides requested {}", existing, requested);
                Ok(None)
            }
            (Precedence::Normal, Precedence::Force) => {
                debug!("{} overrides requested {}", requested, existing);
                *existing = requested.clone();
                Ok(Some(requested))
            }
            _ => Err(ResolveError::Conflict {
                name: requested.name.clone(),
                existing: existing.to_string(),
                requested: requested.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::{
        index::PackageIndex,
        recipe::{PlatformCondition, PlatformRule},
    };

    use pretty_assertions::assert_eq;

    fn spec(reference: &str) -> DependencySpec {
        DependencySpec::parse(reference).unwrap()
    }

    fn capture_recipe() -> Recipe {
        Recipe {
            requires: vec![
                spec("spdlog/1.11.0").with_transitive_libs(true),
                spec("fmt/9.1.0").with_transitive_libs(true).forced(),
                spec("ffmpeg/6.1@camposs/stable").with_transitive_libs(true),
                spec("opencv/4.8.0@camposs/stable").with_transitive_libs(true),
            ],
            options: vec![OptionOverride::new("ffmpeg", "with_ssl", false)],
            rules: vec![PlatformRule {
                condition: PlatformCondition::os("Macos"),
                options: vec![
                    OptionOverride::new("opencv", "with_ipp", false),
                    OptionOverride::new("ffmpeg", "with_videotoolbox", true),
                ],
            }],
            ..Recipe::new("capture")
        }
    }

    fn linux() -> PlatformDescriptor {
        PlatformDescriptor::new("Linux", "gcc", "Release", "x86_64")
    }

    fn macos() -> PlatformDescriptor {
        PlatformDescriptor::new("Macos", "apple-clang", "Release", "armv8")
    }

    #[test]
    fn resolution_is_deterministic() {
        let recipe = capture_recipe();
        let resolver = Resolver::new(&recipe);
        for platform in [linux(), macos()] {
            assert_eq!(
                resolver.resolve(&platform).unwrap(),
                resolver.resolve(&platform).unwrap()
            );
        }
    }

    #[test]
    fn macos_disables_ipp_and_enables_videotoolbox() {
        let recipe = capture_recipe();
        let resolution = Resolver::new(&recipe).resolve(&macos()).unwrap();
        assert_eq!(
            resolution.options,
            vec![
                OptionOverride::new("ffmpeg", "with_ssl", false),
                OptionOverride::new("opencv", "with_ipp", false),
                OptionOverride::new("ffmpeg", "with_videotoolbox", true),
            ]
        );
    }

    #[test]
    fn other_platforms_keep_only_unconditional_options() {
        let recipe = capture_recipe();
        for os in ["Linux", "Windows", "macos"] {
            let platform = PlatformDescriptor::new(os, "gcc", "Debug", "x86_64");
            let resolution = Resolver::new(&recipe).resolve(&platform).unwrap();
            assert_eq!(resolution.option("opencv", "with_ipp"), None);
            assert_eq!(resolution.option("ffmpeg", "with_videotoolbox"), None);
            assert_eq!(
                resolution.options,
                vec![OptionOverride::new("ffmpeg", "with_ssl", false)]
            );
        }
    }

    #[test]
    fn matching_rule_overwrites_in_place() {
        let recipe = Recipe {
            requires: vec![spec("ffmpeg/6.1")],
            options: vec![
                OptionOverride::new("ffmpeg", "with_ssl", "openssl"),
                OptionOverride::new("ffmpeg", "shared", false),
            ],
            rules: vec![
                PlatformRule {
                    condition: PlatformCondition::os("Macos"),
                    options: vec![OptionOverride::new("ffmpeg", "with_ssl", "securetransport")],
                },
                PlatformRule {
                    condition: PlatformCondition {
                        os: Some("Macos".to_owned()),
                        arch: Some("armv8".to_owned()),
                        ..Default::default()
                    },
                    options: vec![OptionOverride::new("ffmpeg", "with_ssl", false)],
                },
            ],
            ..Recipe::new("ffmpeg-only")
        };
        let resolver = Resolver::new(&recipe);

        let resolution = resolver.resolve(&macos()).unwrap();
        assert_eq!(
            resolution.options,
            vec![
                OptionOverride::new("ffmpeg", "with_ssl", false),
                OptionOverride::new("ffmpeg", "shared", false),
            ]
        );

        let intel_mac = PlatformDescriptor::new("Macos", "apple-clang", "Release", "x86_64");
        let resolution = resolver.resolve(&intel_mac).unwrap();
        assert_eq!(
            resolution.option("ffmpeg", "with_ssl"),
            Some(&"securetransport".into())
        );
    }

    #[test]
    fn forced_entry_wins() {
        for requires in [
            vec![spec("fmt/9.0.0"), spec("fmt/9.1.0").forced()],
            vec![spec("fmt/9.1.0").forced(), spec("fmt/9.0.0")],
        ] {
            let recipe = Recipe {
                requires,
                ..Recipe::new("forced")
            };
            let resolution = Resolver::new(&recipe).resolve(&linux()).unwrap();
            assert_eq!(resolution.dependencies, vec![spec("fmt/9.1.0").forced()]);
        }
    }

    #[test]
    fn unforced_disagreement_is_a_conflict() {
        let recipe = Recipe {
            requires: vec![
                spec("opencv/4.8.0@camposs/stable"),
                spec("opencv/4.5.5@camposs/stable"),
            ],
            ..Recipe::new("conflicting")
        };
        assert_eq!(
            Resolver::new(&recipe).resolve(&linux()),
            Err(ResolveError::Conflict {
                name: PackageName::from("opencv"),
                existing: "opencv/4.8.0@camposs/stable".to_owned(),
                requested: "opencv/4.5.5@camposs/stable".to_owned(),
            })
        );
    }

    #[test]
    fn channel_disagreement_is_a_conflict() {
        let recipe = Recipe {
            requires: vec![spec("ffmpeg/6.1@camposs/stable"), spec("ffmpeg/6.1")],
            ..Recipe::new("conflicting")
        };
        assert!(matches!(
            Resolver::new(&recipe).resolve(&linux()),
            Err(ResolveError::Conflict { .. })
        ));
    }

    #[test]
    fn two_forced_disagreeing_entries_conflict() {
        let recipe = Recipe {
            requires: vec![spec("fmt/9.0.0").forced(), spec("fmt/9.1.0").forced()],
            ..Recipe::new("conflicting")
        };
        assert!(matches!(
            Resolver::new(&recipe).resolve(&linux()),
            Err(ResolveError::Conflict { .. })
        ));
    }

    #[test]
    fn identical_requests_are_merged() {
        let recipe = Recipe {
            requires: vec![
                spec("zlib/1.2.13"),
                spec("bzip2/1.0.8"),
                spec("zlib/1.2.13").with_transitive_libs(true),
            ],
            ..Recipe::new("duplicated")
        };
        let resolution = Resolver::new(&recipe).resolve(&linux()).unwrap();
        assert_eq!(
            resolution.dependencies,
            vec![
                spec("zlib/1.2.13").with_transitive_libs(true),
                spec("bzip2/1.0.8"),
            ]
        );
    }

    #[test]
    fn missing_os_is_reported() {
        let recipe = capture_recipe();
        let descriptor = PlatformDescriptor {
            os: None,
            ..linux()
        };
        assert_eq!(
            Resolver::new(&recipe).resolve(&descriptor),
            Err(ResolveError::MissingField(PlatformField::Os))
        );
    }

    #[test]
    fn missing_field_is_reported_before_conflicts() {
        let recipe = Recipe {
            requires: vec![spec("fmt/9.0.0"), spec("fmt/9.1.0")],
            ..Recipe::new("conflicting")
        };
        let descriptor = PlatformDescriptor {
            arch: None,
            ..linux()
        };
        assert_eq!(
            Resolver::new(&recipe).resolve(&descriptor),
            Err(ResolveError::MissingField(PlatformField::Arch))
        );
    }

    #[test]
    fn forced_version_supersedes_transitive_request() {
        let recipe = capture_recipe();
        let mut index = PackageIndex::default();
        index.insert(&spec("spdlog/1.11.0"), vec![spec("fmt/9.1.1")]);
        index.insert(
            &spec("opencv/4.8.0@camposs/stable"),
            vec![spec("zlib/1.2.13"), spec("ffmpeg/6.1@camposs/stable")],
        );
        index.insert(&spec("fmt/9.1.1"), vec![spec("never/1.0")]);

        let resolution = Resolver::with_provider(&recipe, &index)
            .resolve(&linux())
            .unwrap();
        assert_eq!(
            resolution.dependencies,
            vec![
                spec("spdlog/1.11.0").with_transitive_libs(true),
                spec("fmt/9.1.0").with_transitive_libs(true).forced(),
                spec("ffmpeg/6.1@camposs/stable").with_transitive_libs(true),
                spec("opencv/4.8.0@camposs/stable").with_transitive_libs(true),
                spec("zlib/1.2.13"),
            ]
        );
    }

    #[test]
    fn transitive_disagreement_with_unforced_requirement_conflicts() {
        let recipe = capture_recipe();
        let mut index = PackageIndex::default();
        index.insert(
            &spec("opencv/4.8.0@camposs/stable"),
            vec![spec("ffmpeg/6.0@camposs/stable")],
        );
        assert_eq!(
            Resolver::with_provider(&recipe, &index).resolve(&linux()),
            Err(ResolveError::Conflict {
                name: PackageName::from("ffmpeg"),
                existing: "ffmpeg/6.1@camposs/stable".to_owned(),
                requested: "ffmpeg/6.0@camposs/stable".to_owned(),
            })
        );
    }

    #[test]
    fn upstream_cycles_terminate() {
        let recipe = Recipe {
            requires: vec![spec("a/1.0")],
            ..Recipe::new("cyclic")
        };
        let mut index = PackageIndex::default();
        index.insert(&spec("a/1.0"), vec![spec("b/1.0")]);
        index.insert(&spec("b/1.0"), vec![spec("a/1.0")]);
        let resolution = Resolver::with_provider(&recipe, &index)
            .resolve(&linux())
            .unwrap();
        assert_eq!(resolution.dependencies, vec![spec("a/1.0"), spec("b/1.0")]);
    }

    #[test]
    fn upstream_requests_are_never_forced() {
        let recipe = Recipe {
            requires: vec![spec("app/1.0"), spec("fmt/9.0.0").forced()],
            ..Recipe::new("upstream")
        };
        let mut index = PackageIndex::default();
        index.insert(&spec("app/1.0"), vec![spec("fmt/10.0.0").forced()]);
        let resolution = Resolver::with_provider(&recipe, &index)
            .resolve(&linux())
            .unwrap();
        assert_eq!(resolution.dependency("fmt"), Some(&spec("fmt/9.0.0").forced()));
    }
}
