//! Product records as read from and written back to the product store
//!
//! Fields the engine does not understand are kept in `extra` so an enriched
//! product round-trips everything the caller supplied.

use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Grams per pound, used when converting shipping weights
pub const GRAMS_PER_POUND: f64 = 453.592;

/// A product record owned by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, deserialize_with = "string_or_number", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,

    #[serde(default)]
    pub title: String,

    /// Rich-text description; accepts both GraphQL and REST field names
    #[serde(default, rename = "descriptionHtml", alias = "body_html")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,

    #[serde(default, deserialize_with = "tag_list")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default)]
    pub variants: Vec<Variant>,

    #[serde(default)]
    pub images: Vec<Image>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metafields: Vec<Metafield>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub purchase_options: Vec<PurchaseOption>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_review: Option<bool>,

    /// Resolved external category id, null when unmapped
    #[serde(default)]
    pub external_category_id: Option<String>,

    /// Resolved external category full name, null when unmapped
    #[serde(default)]
    pub external_category: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Product {
    /// Convenience constructor used by tests and the CLI
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Builder-style id setter
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Stable identity: numeric id, else handle, else title
    pub fn cache_key(&self) -> Option<String> {
        [self.id.as_deref(), self.handle.as_deref(), Some(self.title.as_str())]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|key| !key.is_empty())
            .map(str::to_string)
    }

    /// Weight of the first variant in pounds, zero if unknown
    pub fn current_weight(&self) -> f64 {
        self.variants
            .first()
            .and_then(|variant| variant.weight)
            .unwrap_or(0.0)
    }

    /// `size_info` metafield of the first variant, if any
    pub fn size_info(&self) -> Option<&str> {
        self.variants.first().and_then(Variant::size_info)
    }

    /// Description truncated to `max_chars` characters, with an ellipsis when cut
    pub fn description_excerpt(&self, max_chars: usize) -> String {
        let mut chars = self.description.chars();
        let excerpt: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{excerpt}...")
        } else {
            excerpt
        }
    }

    /// Adds a product-level metafield unless one with the same namespace and key exists.
    ///
    /// Returns `true` when the metafield was added.
    pub fn add_metafield_if_absent(&mut self, metafield: Metafield) -> bool {
        let exists = self
            .metafields
            .iter()
            .any(|m| m.namespace == metafield.namespace && m.key == metafield.key);
        if exists {
            return false;
        }
        self.metafields.push(metafield);
        true
    }
}

/// A purchasable variant of a product
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    #[serde(default, deserialize_with = "string_or_number", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Weight in pounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_unit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grams: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metafields: Vec<Metafield>,

    /// Shipping-weight working notes; never sent to the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_data: Option<WeightData>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Variant {
    /// Variant with only a weight, in pounds
    pub fn with_weight(weight: f64) -> Self {
        Self {
            weight: Some(weight),
            ..Self::default()
        }
    }

    /// Free-form size metadata stored in the `size_info` metafield
    pub fn size_info(&self) -> Option<&str> {
        self.metafields
            .iter()
            .find(|m| m.key == "size_info")
            .and_then(|m| m.value.as_str())
    }

    /// Sets the shipping weight in pounds and the derived gram value
    pub fn set_shipping_weight(&mut self, pounds: f64) {
        self.weight = Some(pounds);
        self.grams = Some((pounds * GRAMS_PER_POUND).max(0.0) as u64);
    }
}

/// A product image with its descriptive alt text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,

    #[serde(default, alias = "altText", skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A namespaced key/value attached to a product or variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metafield {
    pub namespace: String,
    pub key: String,
    pub value: Value,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
}

/// Shipping weight breakdown inferred by the model, all weights in pounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightEstimate {
    pub original_weight: f64,
    pub product_weight: f64,
    pub product_packaging_weight: f64,
    pub shipping_packaging_weight: f64,
    pub calculated_shipping_weight: f64,
    pub final_shipping_weight: f64,
    pub confidence: String,
    pub source: String,
    pub reasoning: String,
}

impl Default for WeightEstimate {
    fn default() -> Self {
        Self {
            original_weight: 0.0,
            product_weight: 0.0,
            product_packaging_weight: 0.0,
            shipping_packaging_weight: 0.0,
            calculated_shipping_weight: 0.0,
            final_shipping_weight: 0.0,
            confidence: "unknown".to_string(),
            source: "unknown".to_string(),
            reasoning: String::new(),
        }
    }
}

/// Weight estimate as recorded on each variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightData {
    #[serde(flatten)]
    pub estimate: WeightEstimate,
    #[serde(default)]
    pub needs_review: bool,
}

/// Fulfilment options a product can be sold with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PurchaseOption {
    Delivery = 1,
    StorePickup = 2,
    LocalDelivery = 3,
    WhiteGloveDelivery = 4,
    CustomerPickupOnly = 5,
}

impl PurchaseOption {
    /// Storefront label for this option
    pub fn label(self) -> &'static str {
        match self {
            Self::Delivery => "Delivery (standard shipping)",
            Self::StorePickup => "Store Pickup",
            Self::LocalDelivery => "Local Delivery (within service area)",
            Self::WhiteGloveDelivery => "White Glove Delivery (premium items)",
            Self::CustomerPickupOnly => "Customer Pickup Only (bulk items)",
        }
    }

    /// Whether any option in the list ships by carrier
    pub fn ships(options: &[PurchaseOption]) -> bool {
        options.contains(&Self::Delivery)
    }

    /// `{"1": "Delivery (standard shipping)", ...}` for the given options
    pub fn label_map(options: &[PurchaseOption]) -> BTreeMap<String, &'static str> {
        options
            .iter()
            .map(|option| ((*option as u8).to_string(), option.label()))
            .collect()
    }
}

impl TryFrom<u8> for PurchaseOption {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Delivery),
            2 => Ok(Self::StorePickup),
            3 => Ok(Self::LocalDelivery),
            4 => Ok(Self::WhiteGloveDelivery),
            5 => Ok(Self::CustomerPickupOnly),
            other => Err(format!("unknown purchase option {other}")),
        }
    }
}

impl From<PurchaseOption> for u8 {
    fn from(option: PurchaseOption) -> Self {
        option as u8
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

fn tag_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Option::<Tags>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Tags::List(tags)) => tags,
        Some(Tags::Joined(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect(),
    })
}
