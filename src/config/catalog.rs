//! Course catalog

use std::{fs, path::Path};

use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::USD};
use serde::Deserialize;
use tracing::info;

use crate::{
    config::{ConfigError, parse::parse_usd_price},
    items::OrderLineItem,
};

/// Courses file
#[derive(Debug, Deserialize)]
pub struct CatalogFixture {
    /// Course id -> course
    pub courses: FxHashMap<String, CourseFixture>,
}

/// Course Fixture
#[derive(Debug, Deserialize)]
pub struct CourseFixture {
    /// Listing title
    pub title: String,

    /// Price (e.g., "299.00 USD")
    pub price: String,

    /// Pre-markdown price, if the course is on sale
    #[serde(default)]
    pub original_price: Option<String>,

    /// Length label such as "12 weeks"
    pub duration: String,
}

impl CourseFixture {
    /// Convert into a line item with the given id.
    ///
    /// # Errors
    ///
    /// Returns an error if a price cannot be parsed.
    pub fn try_into_item(self, id: &str) -> Result<OrderLineItem, ConfigError> {
        let price = parse_usd_price(&self.price)?;
        let item = OrderLineItem::new(id, self.title, price, self.duration)?;

        match self.original_price {
            Some(original) => Ok(item.with_original_price(parse_usd_price(&original)?)?),
            None => Ok(item),
        }
    }
}

/// Courses available for purchase, ordered by id.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseCatalog {
    courses: Vec<OrderLineItem>,
}

impl CourseCatalog {
    /// Build a catalog from line items.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateCourse`] if two items share an id.
    pub fn new(courses: impl IntoIterator<Item = OrderLineItem>) -> Result<Self, ConfigError> {
        let mut courses: Vec<OrderLineItem> = courses.into_iter().collect();

        courses.sort_by(|a, b| a.id().cmp(b.id()));

        let duplicate = courses.windows(2).find_map(|pair| match pair {
            [a, b] if a.id() == b.id() => Some(b.id().to_string()),
            _ => None,
        });

        if let Some(id) = duplicate {
            return Err(ConfigError::DuplicateCourse(id));
        }

        Ok(Self { courses })
    }

    /// The courses the storefront ships with.
    ///
    /// # Errors
    ///
    /// Only fails if the built-in courses are invalid.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::new([
            OrderLineItem::new(
                "data-analysis",
                "Data Analysis with Python",
                Money::from_minor(24_900, USD),
                "8 weeks",
            )?,
            OrderLineItem::new(
                "fullstack-web",
                "Full-Stack Web Development",
                Money::from_minor(29_900, USD),
                "12 weeks",
            )?
            .with_original_price(Money::from_minor(39_900, USD))?,
            OrderLineItem::new(
                "product-design",
                "Product Design Fundamentals",
                Money::from_minor(14_900, USD),
                "6 weeks",
            )?,
            OrderLineItem::new(
                "cloud-devops",
                "Cloud & DevOps Bootcamp",
                Money::from_minor(34_900, USD),
                "10 weeks",
            )?
            .with_original_price(Money::from_minor(44_900, USD))?,
        ])
    }

    /// Parse a catalog from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or a course is invalid.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let fixture: CatalogFixture = serde_norway::from_str(contents)?;

        let courses = fixture
            .courses
            .into_iter()
            .map(|(id, course)| course.try_into_item(&id))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Self::new(courses)
    }

    /// Load a catalog file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let catalog = Self::from_yaml_str(&fs::read_to_string(path)?)?;

        info!(path = %path.display(), courses = catalog.len(), "loaded course catalog");

        Ok(catalog)
    }

    /// Load `path` when given, otherwise use the built-in courses.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    /// Look up a course.
    pub fn get(&self, id: &str) -> Option<&OrderLineItem> {
        self.courses
            .binary_search_by(|course| course.id().cmp(id))
            .ok()
            .and_then(|idx| self.courses.get(idx))
    }

    /// Line items for `ids`, in the order given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCourse`] for the first id not in the catalog.
    pub fn select<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<OrderLineItem>, ConfigError> {
        ids.iter()
            .map(|id| {
                self.get(id.as_ref())
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownCourse(id.as_ref().to_string()))
            })
            .collect()
    }

    /// Every course, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &OrderLineItem> {
        self.courses.iter()
    }

    /// Number of courses
    pub fn len(&self) -> usize {
        self.courses.len()
    }

    /// Whether the catalog has no courses
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    const COURSES: &str = r#"
courses:
  web:
    title: Full-Stack Web Development
    price: "299.00 USD"
    original_price: "399.00 USD"
    duration: 12 weeks
  data:
    title: Data Analysis with Python
    price: "249.00 USD"
    duration: 8 weeks
"#;

    #[test]
    fn parses_courses_sorted_by_id() -> TestResult {
        let catalog = CourseCatalog::from_yaml_str(COURSES)?;
        let ids: Vec<&str> = catalog.iter().map(OrderLineItem::id).collect();

        assert_eq!(ids, ["data", "web"]);

        let web = catalog.get("web").ok_or("missing course")?;

        assert_eq!(web.unit_price(), &Money::from_minor(29_900, USD));
        assert_eq!(web.original_price(), Some(&Money::from_minor(39_900, USD)));

        Ok(())
    }

    #[test]
    fn select_keeps_requested_order() -> TestResult {
        let catalog = CourseCatalog::from_yaml_str(COURSES)?;
        let items = catalog.select(&["web", "data"])?;

        assert_eq!(items.len(), 2);
        assert_eq!(items.first().map(OrderLineItem::id), Some("web"));

        Ok(())
    }

    #[test]
    fn select_rejects_unknown_ids() -> TestResult {
        let catalog = CourseCatalog::builtin()?;

        assert!(matches!(
            catalog.select(&["fullstack-web", "basket-weaving"]),
            Err(ConfigError::UnknownCourse(id)) if id == "basket-weaving"
        ));

        Ok(())
    }

    #[test]
    fn rejects_non_usd_prices() {
        let yaml = COURSES.replace("249.00 USD", "249.00 EUR");

        assert!(matches!(
            CourseCatalog::from_yaml_str(&yaml),
            Err(ConfigError::InvalidPrice(_))
        ));
    }

    #[test]
    fn rejects_duplicate_ids() -> TestResult {
        let item = OrderLineItem::new("web", "Web", Money::from_minor(100, USD), "1 week")?;

        assert!(matches!(
            CourseCatalog::new([item.clone(), item]),
            Err(ConfigError::DuplicateCourse(id)) if id == "web"
        ));

        Ok(())
    }
}
