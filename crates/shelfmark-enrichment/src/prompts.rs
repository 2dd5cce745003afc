//! Prompt construction for the two enhancement calls
//!
//! Both the interactive and batch paths build prompts here so a product gets
//! the same request whichever way it is executed.

use shelfmark_core::Product;
use std::fmt::Write;

/// Prompt asking for a category assignment, purchase options and a shipping
/// weight estimate, answered as a single JSON object
pub fn taxonomy_prompt(product: &Product, taxonomy_doc: &str) -> String {
    let mut facts = format!(
        "- Title: {}\n- Description: {}",
        product.title, product.description
    );
    if let Some(size) = product.size_info() {
        let _ = write!(facts, "\n- Dimensions/Size: {size}");
    }
    let current_weight = product.current_weight();
    if current_weight > 0.0 {
        let _ = write!(facts, "\n- Current variant weight: {current_weight} lbs");
    }

    format!(
        "You categorize products, choose their fulfilment options and estimate shipping weight.\n\n\
         {taxonomy_doc}\n\n\
         Product to analyze:\n{facts}\n\n\
         1. Assign a department, category and subcategory using only names from the taxonomy above.\n\
         2. Choose the purchase options the category allows:\n\
         \x20  1 = Delivery (standard shipping)\n\
         \x20  2 = Store Pickup\n\
         \x20  3 = Local Delivery (within service area)\n\
         \x20  4 = White Glove Delivery (premium items)\n\
         \x20  5 = Customer Pickup Only (bulk items)\n\
         3. Estimate the weight in pounds. If option 1 is selected, add product and shipping \
         packaging, round up to the nearest 0.5 lb and add a 10% margin. Otherwise report the \
         product weight with product packaging only. Prefer the current variant weight, then a \
         weight stated in the text, then dimensions, then an estimate.\n\
         4. Set needs_review to true when the weight confidence is low or the product fits \
         no category well.\n\n\
         Return only a JSON object of this shape:\n\
         {{\n\
         \x20 \"department\": \"...\",\n\
         \x20 \"category\": \"...\",\n\
         \x20 \"subcategory\": \"... or empty string\",\n\
         \x20 \"reasoning\": \"...\",\n\
         \x20 \"weight_estimation\": {{\n\
         \x20   \"original_weight\": {current_weight},\n\
         \x20   \"product_weight\": 0.0,\n\
         \x20   \"product_packaging_weight\": 0.0,\n\
         \x20   \"shipping_packaging_weight\": 0.0,\n\
         \x20   \"calculated_shipping_weight\": 0.0,\n\
         \x20   \"final_shipping_weight\": 0.0,\n\
         \x20   \"confidence\": \"high|medium|low\",\n\
         \x20   \"source\": \"variant_weight|extracted_from_text|calculated_from_dimensions|estimated\",\n\
         \x20   \"reasoning\": \"...\"\n\
         \x20 }},\n\
         \x20 \"purchase_options\": [1, 2],\n\
         \x20 \"needs_review\": false\n\
         }}"
    )
}

/// Prompt asking for a rewritten HTML description in the house voice
pub fn description_prompt(
    title: &str,
    description: &str,
    department: &str,
    voice_doc: &str,
) -> String {
    format!(
        "You are a product copywriter. Rewrite this description following our voice and tone \
         guidelines.\n\n\
         {voice_doc}\n\n\
         Product information:\n\
         - Title: {title}\n\
         - Department: {department}\n\
         - Current Description: {description}\n\n\
         Apply the tone guidelines for the \"{department}\" department. Address the customer \
         directly, lead with benefits and use cases, and mention key attributes early.\n\n\
         Return only the rewritten description as HTML, with no explanation or Markdown."
    )
}
