//! Automatic entry names.
//!
//! A [`NamingStrategy`] is a pure function of [`NamingState`]: asking for a name never mutates
//! anything, it hands back the name together with the advanced state. [`NamingConfiguration`]
//! is the small owner that builders carry around and pass down to nested builders.

use indexmap::IndexMap;
use rand::{distr::Alphanumeric, rngs::StdRng, Rng, SeedableRng};
use std::fmt;

const RANDOM_NAME_LENGTH: usize = 8;
const DEFAULT_SEED: u64 = 0x5EED_F57A;

/// Counters consumed by a [`NamingStrategy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingState {
    /// Names generated so far, across every extension.
    pub count: usize,
    /// Names generated so far, per extension (`""` for directories).
    pub per_extension: IndexMap<String, usize>,
    pub seed: u64,
    /// Every generated name, in generation order.
    pub created: Vec<String>,
}
impl NamingState {
    pub fn new(seed: u64) -> Self {
        Self {
            count: 0,
            per_extension: IndexMap::new(),
            seed,
            created: Vec::new(),
        }
    }
    pub fn extension_count(&self, extension: &str) -> usize {
        self.per_extension.get(extension).copied().unwrap_or(0)
    }
    fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed.wrapping_add(self.count as u64))
    }
    fn advanced(&self, extension: &str, name: &str) -> Self {
        let mut next = self.clone();
        next.count += 1;
        *next.per_extension.entry(extension.to_string()).or_insert(0) += 1;
        next.created.push(name.to_string());
        next
    }
}
impl Default for NamingState {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

pub type NamingFn = Box<dyn Fn(&NamingState, &str) -> String>;

pub enum NamingStrategy {
    /// Eight random alphanumeric characters.
    RandomName,
    /// `{random}_{count}{extension}`
    RandomNameWithCounter,
    /// `{base}{extension}`, then `{base}{extension}(1)`, `{base}{extension}(2)`, ...
    Sequential { base: String },
    /// `{extension}_{n}{extension}`, e.g. `txt_1.txt`; directories become `entry_{n}`.
    ExtensionCounter,
    /// A random `u32`.
    RandomNumber,
    Custom(NamingFn),
}
impl NamingStrategy {
    pub fn sequential(base: impl Into<String>) -> Self {
        Self::Sequential { base: base.into() }
    }
    pub fn custom<F>(generate: F) -> Self
    where
        F: Fn(&NamingState, &str) -> String + 'static,
    {
        Self::Custom(Box::new(generate))
    }
    /// Produces the next name for `extension` and the state that follows it.
    pub fn next(&self, state: &NamingState, extension: &str) -> (String, NamingState) {
        let name = self.generate(state, extension);
        let next = state.advanced(extension, &name);

        (name, next)
    }
    fn generate(&self, state: &NamingState, extension: &str) -> String {
        match self {
            Self::RandomName => format!("{}{extension}", random_name(state)),
            Self::RandomNameWithCounter => {
                format!("{}_{}{extension}", random_name(state), state.count + 1)
            }
            Self::Sequential { base } => match state.extension_count(extension) {
                0 => format!("{base}{extension}"),
                n => format!("{base}{extension}({n})"),
            },
            Self::ExtensionCounter => {
                let n = state.extension_count(extension) + 1;
                match extension.trim_start_matches('.') {
                    "" => format!("entry_{n}"),
                    stem => format!("{stem}_{n}{extension}"),
                }
            }
            Self::RandomNumber => format!("{}{extension}", state.rng().random::<u32>()),
            Self::Custom(generate) => generate(state, extension),
        }
    }
}
impl fmt::Debug for NamingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RandomName => write!(f, "RandomName"),
            Self::RandomNameWithCounter => write!(f, "RandomNameWithCounter"),
            Self::Sequential { base } => write!(f, "Sequential({base:?})"),
            Self::ExtensionCounter => write!(f, "ExtensionCounter"),
            Self::RandomNumber => write!(f, "RandomNumber"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

fn random_name(state: &NamingState) -> String {
    state
        .rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_NAME_LENGTH)
        .map(char::from)
        .collect()
}

/// A strategy plus the state it is currently at.
#[derive(Debug)]
pub struct NamingConfiguration {
    strategy: NamingStrategy,
    state: NamingState,
}
impl NamingConfiguration {
    pub fn new(strategy: NamingStrategy) -> Self {
        Self {
            strategy,
            state: NamingState::default(),
        }
    }
    pub fn with_seed(strategy: NamingStrategy, seed: u64) -> Self {
        Self {
            strategy,
            state: NamingState::new(seed),
        }
    }
    pub fn strategy(&self) -> &NamingStrategy {
        &self.strategy
    }
    pub fn state(&self) -> &NamingState {
        &self.state
    }
    /// Generates a name and moves to the following state.
    pub fn next_name(&mut self, extension: &str) -> String {
        let (name, next) = self.strategy.next(&self.state, extension);
        self.state = next;

        log::debug!("generated name: {name}");

        name
    }
    /// Restarts counting. The strategy and the seed are kept.
    pub fn refresh(&mut self) {
        self.state = NamingState::new(self.state.seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_names_are_distinct_and_increasing() {
        let mut naming = NamingConfiguration::new(NamingStrategy::sequential("file"));

        let names: Vec<String> = (0..5).map(|_| naming.next_name(".txt")).collect();

        assert_eq!(
            names,
            vec![
                "file.txt",
                "file.txt(1)",
                "file.txt(2)",
                "file.txt(3)",
                "file.txt(4)"
            ]
        );
    }

    #[test]
    fn test_sequential_counts_per_extension() {
        let mut naming = NamingConfiguration::new(NamingStrategy::sequential("doc"));

        assert_eq!(naming.next_name(".md"), "doc.md");
        assert_eq!(naming.next_name(".txt"), "doc.txt");
        assert_eq!(naming.next_name(".md"), "doc.md(1)");
        assert_eq!(naming.state().count, 3);
        assert_eq!(naming.state().extension_count(".md"), 2);
    }

    #[test]
    fn test_zero_names_leaves_state_untouched() {
        let naming = NamingConfiguration::new(NamingStrategy::sequential("file"));

        assert_eq!(naming.state(), &NamingState::default());
    }

    #[test]
    fn test_next_is_pure() {
        let strategy = NamingStrategy::ExtensionCounter;
        let state = NamingState::default();

        let (first, _) = strategy.next(&state, ".log");
        let (again, advanced) = strategy.next(&state, ".log");

        assert_eq!(first, again);
        assert_eq!(first, "log_1.log");
        assert_eq!(advanced.created, vec!["log_1.log".to_string()]);
        assert_eq!(state.count, 0);
    }

    #[test]
    fn test_extension_counter_for_directories() {
        let mut naming = NamingConfiguration::new(NamingStrategy::ExtensionCounter);

        assert_eq!(naming.next_name(""), "entry_1");
        assert_eq!(naming.next_name(""), "entry_2");
    }

    #[test]
    fn test_random_names_are_seeded() {
        let mut first = NamingConfiguration::with_seed(NamingStrategy::RandomName, 7);
        let mut second = NamingConfiguration::with_seed(NamingStrategy::RandomName, 7);

        let a: Vec<String> = (0..3).map(|_| first.next_name(".bin")).collect();
        let b: Vec<String> = (0..3).map(|_| second.next_name(".bin")).collect();

        assert_eq!(a, b);
        assert!(a.iter().all(|name| name.len() == RANDOM_NAME_LENGTH + 4));
        assert_eq!(a.iter().collect::<HashSet<_>>().len(), 3);
    }

    #[test]
    fn test_random_name_with_counter() {
        let mut naming = NamingConfiguration::new(NamingStrategy::RandomNameWithCounter);

        let name = naming.next_name(".txt");

        assert!(name.ends_with("_1.txt"), "{name}");
    }

    #[test]
    fn test_custom_strategy_sees_state() {
        let mut naming = NamingConfiguration::new(NamingStrategy::custom(|state, ext| {
            format!("case-{:03}{ext}", state.count)
        }));

        assert_eq!(naming.next_name(".json"), "case-000.json");
        assert_eq!(naming.next_name(".json"), "case-001.json");
    }

    #[test]
    fn test_refresh_restarts_counting() {
        let mut naming = NamingConfiguration::with_seed(NamingStrategy::sequential("f"), 42);
        naming.next_name(".txt");
        naming.next_name(".txt");

        naming.refresh();

        assert_eq!(naming.state().count, 0);
        assert_eq!(naming.state().seed, 42);
        assert_eq!(naming.next_name(".txt"), "f.txt");
    }
}
