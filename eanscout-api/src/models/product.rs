//! Product records and stored images

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether any source ever matched a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Resolved,
    #[default]
    Unresolved,
}

impl ResolutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStatus::Resolved => "resolved",
            ResolutionStatus::Unresolved => "unresolved",
        }
    }

    /// Unknown stored values read as unresolved
    pub fn from_db(value: &str) -> Self {
        match value {
            "resolved" => ResolutionStatus::Resolved,
            _ => ResolutionStatus::Unresolved,
        }
    }
}

/// Fields a site adapter extracts for one EAN
///
/// Every field is a possibly-empty string. An adapter that found nothing
/// still returns a value, with an empty `name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub brand: String,
    pub category: String,
    pub name: String,
    pub description: String,
    pub color: String,
    pub size: String,
    pub long_description: String,
    pub source: String,
    pub source_url: String,
    pub image_url: String,
    pub price: String,
}

impl ProductDetails {
    /// A result counts as a match only when it carries a product name
    pub fn is_hit(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// Column values for inserting or rewriting a product row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProduct {
    pub ean: String,
    pub brand: String,
    pub category: String,
    pub name: String,
    pub description: String,
    pub color: String,
    pub size: String,
    pub long_description: String,
    pub source: String,
    pub source_url: String,
    pub price: String,
    pub box_number: String,
    pub resolution_status: ResolutionStatus,
}

impl NewProduct {
    /// Record carrying only what the caller supplied
    pub fn seed(ean: &str, brand: Option<&str>, box_number: Option<&str>) -> Self {
        Self {
            ean: ean.to_string(),
            brand: brand.unwrap_or_default().trim().to_string(),
            box_number: box_number.unwrap_or_default().trim().to_string(),
            ..Self::default()
        }
    }

    /// Overlay a matching adapter result
    ///
    /// Adapter fields replace seed fields; a blank adapter brand keeps the
    /// caller's brand. The box number always comes from the seed.
    pub fn merge(self, details: &ProductDetails) -> Self {
        let brand = if details.brand.trim().is_empty() {
            self.brand
        } else {
            details.brand.clone()
        };

        Self {
            ean: self.ean,
            brand,
            category: details.category.clone(),
            name: details.name.clone(),
            description: details.description.clone(),
            color: details.color.clone(),
            size: details.size.clone(),
            long_description: details.long_description.clone(),
            source: details.source.clone(),
            source_url: details.source_url.clone(),
            price: details.price.clone(),
            box_number: self.box_number,
            resolution_status: ResolutionStatus::Resolved,
        }
    }
}

/// Stored product as served by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: i64,
    pub ean: String,
    pub brand: String,
    pub category: String,
    pub name: String,
    pub description: String,
    pub color: String,
    pub size: String,
    pub long_description: String,
    pub source: String,
    pub source_url: String,
    pub price: String,
    pub box_number: String,
    pub resolution_status: ResolutionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Primary first, then in insertion order
    pub images: Vec<ProductImage>,
}

impl ProductRecord {
    pub fn is_resolved(&self) -> bool {
        self.resolution_status == ResolutionStatus::Resolved
    }

    pub fn primary_image(&self) -> Option<&ProductImage> {
        self.images.iter().find(|img| img.is_primary)
    }
}

/// Stored image row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: i64,
    pub product_ean: String,
    /// Remote origin; `None` for uploads
    pub image_url: Option<String>,
    pub local_path: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

/// Image row to insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    pub product_ean: String,
    pub image_url: Option<String>,
    pub local_path: String,
    /// Request primary; the first image of a product becomes primary anyway
    pub is_primary: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit() -> ProductDetails {
        ProductDetails {
            brand: "CELIO".to_string(),
            name: "Slim shirt".to_string(),
            source: "CELIO".to_string(),
            source_url: "https://www.celiostore.cz/hledat?query=3596655503845".to_string(),
            ..ProductDetails::default()
        }
    }

    #[test]
    fn test_blank_name_is_not_a_hit() {
        let details = ProductDetails {
            name: "   ".to_string(),
            brand: "CELIO".to_string(),
            ..ProductDetails::default()
        };
        assert!(!details.is_hit());
        assert!(hit().is_hit());
    }

    #[test]
    fn test_merge_prefers_adapter_brand() {
        let merged = NewProduct::seed("3596655503845", Some("Jules"), Some("42")).merge(&hit());

        assert_eq!(merged.brand, "CELIO");
        assert_eq!(merged.name, "Slim shirt");
        assert_eq!(merged.box_number, "42");
        assert_eq!(merged.resolution_status, ResolutionStatus::Resolved);
    }

    #[test]
    fn test_merge_keeps_caller_brand_when_adapter_blank() {
        let details = ProductDetails {
            brand: String::new(),
            ..hit()
        };
        let merged = NewProduct::seed("3596655503845", Some("Jules"), None).merge(&details);
        assert_eq!(merged.brand, "Jules");
    }

    #[test]
    fn test_seed_is_unresolved() {
        let seed = NewProduct::seed("3596655503845", None, None);
        assert_eq!(seed.resolution_status, ResolutionStatus::Unresolved);
        assert!(seed.brand.is_empty());
        assert!(seed.name.is_empty());
    }

    #[test]
    fn test_status_round_trips_through_db_text() {
        assert_eq!(
            ResolutionStatus::from_db(ResolutionStatus::Resolved.as_str()),
            ResolutionStatus::Resolved
        );
        assert_eq!(ResolutionStatus::from_db("garbage"), ResolutionStatus::Unresolved);
    }
}
