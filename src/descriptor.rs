use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

/// A predicate deciding whether a species name belongs to a category.
pub type Categorizer = Arc<dyn Fn(&str) -> bool + Send + Sync>;
/// A function computing a named property of a species from its name.
pub type Propertizer = Arc<dyn Fn(&str) -> f64 + Send + Sync>;

/// Everything the descriptor derives from one name, cached after the first
/// lookup. Categories are sorted; properties are evaluated eagerly.
#[derive(Debug, Clone, Default)]
pub struct NameInfo {
    pub categories: Vec<String>,
    pub properties: FxHashMap<String, f64>,
}

impl NameInfo {
    pub fn in_category(&self, category: &str) -> bool {
        self.categories.binary_search_by(|cat| cat.as_str().cmp(category)).is_ok()
    }
}

/// Registry of category predicates and property functions, memoized by name.
///
/// Predicates and property functions are pure, so the cache never needs
/// invalidation; each simulation owns its own descriptor, a plain map is
/// enough.
pub struct Descriptor {
    cats: Vec<(String, Categorizer)>,
    props: Vec<(String, Propertizer)>,
    cache: FxHashMap<String, Arc<NameInfo>>,
}

impl Descriptor {
    pub fn new() -> Descriptor {
        Descriptor {
            cats: Vec::new(),
            props: Vec::new(),
            cache: FxHashMap::default(),
        }
    }

    pub fn add_cat(&mut self, name: &str, rule: Categorizer) {
        self.cats.push((name.to_string(), rule));
    }

    pub fn add_prop(&mut self, name: &str, func: Propertizer) {
        self.props.push((name.to_string(), func));
    }

    /// The registered category names, in registration order.
    pub fn catlist(&self) -> impl Iterator<Item = &str> {
        self.cats.iter().map(|(name, _)| name.as_str())
    }

    /// Cached categories and properties of `name`.
    pub fn info(&mut self, name: &str) -> Arc<NameInfo> {
        if let Some(info) = self.cache.get(name) {
            return Arc::clone(info);
        }
        let mut categories: Vec<String> = self
            .cats
            .iter()
            .filter(|(_, rule)| rule(name))
            .map(|(cat, _)| cat.clone())
            .collect();
        categories.sort();
        let properties = self
            .props
            .iter()
            .map(|(prop, func)| (prop.clone(), func(name)))
            .collect();
        let info = Arc::new(NameInfo {
            categories,
            properties,
        });
        self.cache.insert(name.to_string(), Arc::clone(&info));
        info
    }

    /// The sorted categories `name` belongs to.
    pub fn categories(&mut self, name: &str) -> Vec<String> {
        self.info(name).categories.clone()
    }

    /// The value of a registered property, 0.0 if the property is unknown.
    pub fn property(&mut self, name: &str, propname: &str) -> f64 {
        self.info(name)
            .properties
            .get(propname)
            .copied()
            .unwrap_or(0.0)
    }
}

impl Default for Descriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("categories", &self.cats.iter().map(|(c, _)| c).collect::<Vec<_>>())
            .field("properties", &self.props.iter().map(|(p, _)| p).collect::<Vec<_>>())
            .field("cached", &self.cache.len())
            .finish()
    }
}
