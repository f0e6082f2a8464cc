use serde::{Deserialize, Serialize};

/// Field names of the fixed product listing schema, in output order.
///
/// These are the camelCase names used on the wire and as export headers.
pub const PRODUCT_FIELDS: [&str; 22] = [
    "title",
    "category",
    "material",
    "color",
    "condition",
    "width",
    "depth",
    "height",
    "features",
    "brand",
    "style",
    "assemblyRequired",
    "weightCapacity",
    "description",
    "shortDescription",
    "faults",
    "region",
    "postalCode",
    "price",
    "deliveryOptions",
    "keywords",
    "images",
];

/// A furniture listing in the fixed schema.
///
/// Every field is a nullable string. List-like values (features, delivery
/// options, keywords, images) are comma separated, `assemblyRequired` holds
/// `"true"` or `"false"`, and prices stay textual to avoid decimal separator
/// trouble between locales.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub title: Option<String>,
    pub category: Option<String>,
    pub material: Option<String>,
    pub color: Option<String>,
    pub condition: Option<String>,
    pub width: Option<String>,
    pub depth: Option<String>,
    pub height: Option<String>,
    pub features: Option<String>,
    pub brand: Option<String>,
    pub style: Option<String>,
    pub assembly_required: Option<String>,
    pub weight_capacity: Option<String>,
    pub description: Option<String>,
    /// At most 200 characters.
    pub short_description: Option<String>,
    pub faults: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub price: Option<String>,
    pub delivery_options: Option<String>,
    pub keywords: Option<String>,
    pub images: Option<String>,
}
