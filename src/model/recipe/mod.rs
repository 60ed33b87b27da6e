pub mod lock;
pub mod resolved;

use std::{fmt::Display, path::Path};

use log::{debug, error};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use toml::{map::Map, Value};

use crate::model::{platform::Platform, ParseError};

#[derive(Clone, Hash, Deserialize, Serialize, Debug, PartialEq, Eq, Ord, PartialOrd)]
pub struct PackageName(String);

impl PackageName {
    pub fn new(s: String) -> Self {
        PackageName(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        PackageName(s)
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        PackageName(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum VersionConstraint {
    /// `4.8.0`
    Exact(String),
    /// `[>=0.5 <1.0]`, stored without the brackets
    Range(String),
}

impl Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionConstraint::Exact(version) => f.write_str(version),
            VersionConstraint::Range(range) => write!(f, "[{}]", range),
        }
    }
}

/// Origin and stability tag of a package, the `user/channel` part of a reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Channel {
    pub user: String,
    pub channel: String,
}

impl Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.user, self.channel)
    }
}

/// Which request wins when two requirements name the same package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum Precedence {
    #[default]
    Normal,
    /// Supersedes any other request for the same package.
    Force,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RequirementEntry", into = "RequirementEntry")]
pub struct DependencySpec {
    pub name: PackageName,
    pub version: VersionConstraint,
    pub channel: Option<Channel>,
    pub transitive_libs: bool,
    pub precedence: Precedence,
}

impl DependencySpec {
    /// Parses a `name/version[@user/channel]` reference. The version may be a
    /// bracketed range.
    pub fn parse(reference: &str) -> Result<DependencySpec, ParseError> {
        let re: Regex = Regex::new(
            r"^(?P<name>[A-Za-z0-9_][A-Za-z0-9_.+-]*)/(?:\[(?P<range>[^\]]+)\]|(?P<version>[A-Za-z0-9_.+-]+))(?:@(?P<user>[A-Za-z0-9_.+-]+)/(?P<channel>[A-Za-z0-9_.+-]+))?$",
        )
        .unwrap();
        let captures = re
            .captures(reference.trim())
            .ok_or_else(|| ParseError::InvalidReference(reference.to_string()))?;

        let name = PackageName::from(&captures["name"]);
        let version = match (captures.name("version"), captures.name("range")) {
            (Some(version), _) => VersionConstraint::Exact(version.as_str().to_string()),
            (None, Some(range)) => VersionConstraint::Range(range.as_str().trim().to_string()),
            (None, None) => return Err(ParseError::InvalidReference(reference.to_string())),
        };
        let channel = match (captures.name("user"), captures.name("channel")) {
            (Some(user), Some(channel)) => Some(Channel {
                user: user.as_str().to_string(),
                channel: channel.as_str().to_string(),
            }),
            _ => None,
        };

        Ok(DependencySpec {
            name,
            version,
            channel,
            transitive_libs: false,
            precedence: Precedence::Normal,
        })
    }

    pub fn forced(self) -> Self {
        DependencySpec {
            precedence: Precedence::Force,
            ..self
        }
    }

    pub fn with_transitive_libs(self, transitive_libs: bool) -> Self {
        DependencySpec {
            transitive_libs,
            ..self
        }
    }

    pub fn is_forced(&self) -> bool {
        self.precedence == Precedence::Force
    }

    /// True when both name the same version from the same channel.
    pub fn same_request(&self, other: &DependencySpec) -> bool {
        self.name == other.name && self.version == other.version && self.channel == other.channel
    }
}

impl Display for DependencySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.version)?;
        if let Some(channel) = &self.channel {
            write!(f, "@{}", channel)?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct RequirementEntry {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default, skip_serializing_if = "is_false")]
    force: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    transitive_libs: bool,
}

fn is_false(value: &bool) -> bool {
    !value
}

impl TryFrom<RequirementEntry> for DependencySpec {
    type Error = ParseError;

    fn try_from(entry: RequirementEntry) -> Result<Self, Self::Error> {
        let spec =
            DependencySpec::parse(&entry.reference)?.with_transitive_libs(entry.transitive_libs);
        Ok(if entry.force { spec.forced() } else { spec })
    }
}

impl From<DependencySpec> for RequirementEntry {
    fn from(spec: DependencySpec) -> Self {
        RequirementEntry {
            reference: spec.to_string(),
            force: spec.is_forced(),
            transitive_libs: spec.transitive_libs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    String(String),
}

impl OptionValue {
    fn from_toml(value: &Value) -> Option<OptionValue> {
        match value {
            Value::Boolean(b) => Some(OptionValue::Bool(*b)),
            Value::Integer(i) => Some(OptionValue::Integer(*i)),
            Value::String(s) => Some(OptionValue::String(s.clone())),
            _ => None,
        }
    }

    fn to_toml(&self) -> Value {
        match self {
            OptionValue::Bool(b) => Value::Boolean(*b),
            OptionValue::Integer(i) => Value::Integer(*i),
            OptionValue::String(s) => Value::String(s.clone()),
        }
    }
}

impl Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Integer(i) => write!(f, "{}", i),
            OptionValue::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Integer(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::String(value.to_string())
    }
}

/// A build option value forced for one package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionOverride {
    pub package: PackageName,
    pub option: String,
    pub value: OptionValue,
}

impl OptionOverride {
    pub fn new(
        package: impl Into<PackageName>,
        option: impl Into<String>,
        value: impl Into<OptionValue>,
    ) -> Self {
        OptionOverride {
            package: package.into(),
            option: option.into(),
            value: value.into(),
        }
    }

    pub fn targets(&self, package: &PackageName, option: &str) -> bool {
        &self.package == package && self.option == option
    }
}

impl Display for OptionOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}={}", self.package, self.option, self.value)
    }
}

/// Platform predicate of a rule. Absent fields match anything, present fields
/// must be equal, case included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PlatformCondition {
    pub os: Option<String>,
    pub compiler: Option<String>,
    pub build_type: Option<String>,
    pub arch: Option<String>,
}

impl PlatformCondition {
    pub fn os(os: impl Into<String>) -> Self {
        PlatformCondition {
            os: Some(os.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, platform: &Platform) -> bool {
        fn accepts(expected: &Option<String>, actual: &str) -> bool {
            expected.as_deref().map_or(true, |expected| expected == actual)
        }

        accepts(&self.os, &platform.os)
            && accepts(&self.compiler, &platform.compiler)
            && accepts(&self.build_type, &platform.build_type)
            && accepts(&self.arch, &platform.arch)
    }

    fn fields(&self) -> [(&'static str, &Option<String>); 4] {
        [
            ("os", &self.os),
            ("compiler", &self.compiler),
            ("build_type", &self.build_type),
            ("arch", &self.arch),
        ]
    }
}

impl Display for PlatformCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let constraints = self
            .fields()
            .into_iter()
            .filter_map(|(key, value)| value.as_ref().map(|value| format!("{}={}", key, value)))
            .collect::<Vec<_>>();
        if constraints.is_empty() {
            f.write_str("any platform")
        } else {
            f.write_str(&constraints.join(", "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformRule {
    pub condition: PlatformCondition,
    pub options: Vec<OptionOverride>,
}

/// The static declaration table of a build: requirements, unconditional
/// option overrides and platform rules, all in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub name: String,
    pub version: Option<String>,
    pub python_requires: Vec<DependencySpec>,
    pub requires: Vec<DependencySpec>,
    pub options: Vec<OptionOverride>,
    pub rules: Vec<PlatformRule>,
}

impl Recipe {
    pub fn new(name: impl Into<String>) -> Self {
        Recipe {
            name: name.into(),
            version: None,
            python_requires: vec![],
            requires: vec![],
            options: vec![],
            rules: vec![],
        }
    }

    pub fn from_file(path: &Path) -> Result<Recipe, ParseError> {
        debug!("Attempting to read recipe from {}", path.display());
        let contents = std::fs::read_to_string(path)?;

        let recipe = Recipe::from_toml_str(&contents);
        if let Err(err) = &recipe {
            error!("Could not build a valid recipe from {} due to err {err}", path.display())
        }
        recipe
    }

    pub fn from_toml_str(data: &str) -> Result<Recipe, ParseError> {
        let mut toml_value = toml::from_str::<Map<String, Value>>(data)?;

        let name = toml_value
            .remove("name")
            .ok_or_else(|| ParseError::MissingKey("name".to_string()))
            .and_then(|v| v.try_into::<String>().map_err(|e| e.into()))?;

        let version = toml_value
            .remove("version")
            .map(|v| v.try_into::<String>())
            .map_or(Ok(None), |v| v.map(Some))?;

        let python_requires = toml_value
            .remove("python_requires")
            .map(|v| v.try_into::<Vec<String>>())
            .map_or(Ok(None), |v| v.map(Some))?
            .unwrap_or_default()
            .iter()
            .map(|reference| DependencySpec::parse(reference))
            .collect::<Result<Vec<_>, _>>()?;

        let requires = toml_value
            .remove("requires")
            .map(|v| v.try_into::<Vec<Value>>())
            .map_or(Ok(None), |v| v.map(Some))?
            .unwrap_or_default()
            .iter()
            .map(parse_requirement)
            .collect::<Result<Vec<_>, _>>()?;

        let options = match toml_value.remove("options") {
            Some(options) => parse_options(options.try_into::<Map<String, Value>>()?)?,
            None => vec![],
        };

        let rules = toml_value
            .remove("rules")
            .map(|v| v.try_into::<Vec<Map<String, Value>>>())
            .map_or(Ok(None), |v| v.map(Some))?
            .unwrap_or_default()
            .into_iter()
            .map(parse_rule)
            .collect::<Result<Vec<_>, _>>()?;

        for key in toml_value.keys() {
            debug!("Ignoring unknown recipe key `{}`", key);
        }

        Ok(Recipe {
            name,
            version,
            python_requires,
            requires,
            options,
            rules,
        })
    }

    pub fn into_toml(self) -> Value {
        let mut recipe = Map::new();
        recipe.insert("name".to_string(), Value::String(self.name));
        if let Some(version) = self.version {
            recipe.insert("version".to_string(), Value::String(version));
        }
        if !self.python_requires.is_empty() {
            recipe.insert(
                "python_requires".to_string(),
                Value::Array(
                    self.python_requires
                        .iter()
                        .map(|r| Value::String(r.to_string()))
                        .collect(),
                ),
            );
        }
        if !self.requires.is_empty() {
            recipe.insert(
                "requires".to_string(),
                Value::Array(self.requires.iter().map(requirement_to_toml).collect()),
            );
        }
        if !self.options.is_empty() {
            recipe.insert("options".to_string(), options_to_toml(&self.options));
        }
        if !self.rules.is_empty() {
            let rules = self
                .rules
                .iter()
                .map(|rule| {
                    let mut table = Map::new();
                    for (key, value) in rule.condition.fields() {
                        if let Some(value) = value {
                            table.insert(key.to_string(), Value::String(value.clone()));
                        }
                    }
                    if !rule.options.is_empty() {
                        table.insert("options".to_string(), options_to_toml(&rule.options));
                    }
                    Value::Table(table)
                })
                .collect();
            recipe.insert("rules".to_string(), Value::Array(rules));
        }
        Value::Table(recipe)
    }
}

fn parse_requirement(value: &Value) -> Result<DependencySpec, ParseError> {
    // bare string shorthand: requires = ["zlib/1.2.13"]
    if let Value::String(reference) = value {
        return DependencySpec::parse(reference);
    }

    let reference = value
        .get("ref")
        .ok_or_else(|| ParseError::MissingKey("ref".to_string()))
        .and_then(|v| v.clone().try_into::<String>().map_err(|e| e.into()))?;

    let force = parse_flag(value, "force")?;
    let transitive_libs = parse_flag(value, "transitive_libs")?;

    let spec = DependencySpec::parse(&reference)?.with_transitive_libs(transitive_libs);
    Ok(if force { spec.forced() } else { spec })
}

fn parse_flag(value: &Value, key: &str) -> Result<bool, ParseError> {
    Ok(value
        .get(key)
        .map(|v| v.clone().try_into::<bool>())
        .map_or(Ok(None), |v| v.map(Some))?
        .unwrap_or(false))
}

fn parse_options(packages: Map<String, Value>) -> Result<Vec<OptionOverride>, ParseError> {
    let mut overrides = Vec::new();
    for (package, options) in packages {
        for (option, value) in options.try_into::<Map<String, Value>>()? {
            let value =
                OptionValue::from_toml(&value).ok_or_else(|| ParseError::InvalidOptionValue {
                    package: package.clone(),
                    option: option.clone(),
                })?;
            overrides.push(OptionOverride::new(package.as_str(), option, value));
        }
    }
    Ok(overrides)
}

fn parse_rule(mut table: Map<String, Value>) -> Result<PlatformRule, ParseError> {
    let options = match table.remove("options") {
        Some(options) => parse_options(options.try_into::<Map<String, Value>>()?)?,
        None => vec![],
    };

    let mut condition = PlatformCondition::default();
    for (key, value) in table {
        let value = value.try_into::<String>()?;
        match key.as_str() {
            "os" => condition.os = Some(value),
            "compiler" => condition.compiler = Some(value),
            "build_type" => condition.build_type = Some(value),
            "arch" => condition.arch = Some(value),
            _ => return Err(ParseError::InvalidRuleKey(key)),
        }
    }

    Ok(PlatformRule { condition, options })
}

fn requirement_to_toml(spec: &DependencySpec) -> Value {
    let mut requirement = Map::new();
    requirement.insert("ref".to_string(), Value::String(spec.to_string()));
    if spec.is_forced() {
        requirement.insert("force".to_string(), Value::Boolean(true));
    }
    if spec.transitive_libs {
        requirement.insert("transitive_libs".to_string(), Value::Boolean(true));
    }
    Value::Table(requirement)
}

fn options_to_toml(options: &[OptionOverride]) -> Value {
    let mut packages = Map::new();
    for option in options {
        match packages.get_mut(option.package.as_str()) {
            Some(Value::Table(table)) => {
                table.insert(option.option.clone(), option.value.to_toml());
            }
            _ => {
                let mut table = Map::new();
                table.insert(option.option.clone(), option.value.to_toml());
                packages.insert(option.package.to_string(), Value::Table(table));
            }
        }
    }
    Value::Table(packages)
}
